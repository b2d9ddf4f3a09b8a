//! Interactive terminal prompts.

use crate::error::ApiError;
use crate::sync::{ConflictPolicy, ConflictResolver, Resolution};
use dialoguer::{Confirm, Select};
use std::io::IsTerminal;

/// Asks on the terminal which side wins a bootstrap conflict.
pub struct PromptResolver;

impl ConflictResolver for PromptResolver {
    fn resolve(&self, _local_exists: bool, _remote_exists: bool) -> Result<Resolution, ApiError> {
        let choices = [
            "Use the remote mapping (replaces the local mapping file)",
            "Keep the local mapping (replaces the remote mirror)",
        ];
        let picked = Select::new()
            .with_prompt("A local mapping exists and a remote mapping mirror was found")
            .items(&choices)
            .default(0)
            .interact_opt()
            .map_err(|e| ApiError::Interrupted(format!("conflict prompt failed: {}", e)))?;
        match picked {
            Some(0) => Ok(Resolution::PullRemote),
            Some(_) => Ok(Resolution::PushLocal),
            None => Err(ApiError::Interrupted(
                "conflict prompt cancelled; nothing was changed".to_string(),
            )),
        }
    }
}

/// Resolver for the configured policy: a prompt only when asked for and stdin is a terminal.
pub fn resolver_for(policy: ConflictPolicy) -> Box<dyn ConflictResolver> {
    match policy.fixed() {
        Some(resolution) => Box::new(resolution),
        None if std::io::stdin().is_terminal() => Box::new(PromptResolver),
        None => Box::new(policy.non_interactive()),
    }
}

/// Yes/no confirmation; cancelling counts as an interrupt.
pub fn confirm(prompt: &str) -> Result<bool, ApiError> {
    Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact_opt()
        .map_err(|e| ApiError::Interrupted(format!("confirmation failed: {}", e)))?
        .ok_or_else(|| ApiError::Interrupted("confirmation cancelled".to_string()))
}
