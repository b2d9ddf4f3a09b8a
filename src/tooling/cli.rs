//! CLI Tooling
//!
//! Command-line surface of the script inventory. A `CliContext` is built once
//! per process: it bootstraps the synchronizer, then every command runs against
//! the registry it owns.

use crate::config::SmConfig;
use crate::error::{ApiError, RemoteError};
use crate::header::header_tags;
use crate::logging::LoggingOverrides;
use crate::provider::{OpenAiGenerator, ScriptGenerator};
use crate::registry::ScriptRegistry;
use crate::remote::{BlobService, BlockingBlobService, GistClient, MirrorClient, RemoteMirror};
use crate::store::{LocalStore, RemoteIdFile, ScriptCache};
use crate::sync::{BootstrapOutcome, ConflictResolver, SyncStatus, Synchronizer};
use crate::tooling::format::{
    format_record, format_records_table, format_status_text, to_json, StatusView,
};
use crate::tooling::{launcher, prompt};
use crate::types::{Metadata, ScriptRecord};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Script Magic - generate, store and run scripts kept in GitHub gists
#[derive(Parser, Debug)]
#[command(name = "sm", version)]
#[command(about = "Personal script inventory backed by GitHub gists")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory holding the mapping, remote id and script cache
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn logging_overrides(&self) -> LoggingOverrides {
        LoggingOverrides {
            verbose: self.verbose,
            level: self.log_level.clone(),
            format: self.log_format.clone(),
            output: self.log_output.clone(),
            file: self.log_file.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a script from a prompt and store it as a gist
    Create {
        /// Script name
        name: String,
        /// What the script should do
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
        /// Replace an existing script with the same name
        #[arg(long)]
        force: bool,
    },
    /// Register an existing gist under a name
    Add {
        name: String,
        /// Gist identifier
        remote_id: String,
        #[arg(long)]
        description: Option<String>,
        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },
    /// List scripts
    List {
        /// Show remote ids and creation times
        #[arg(long)]
        verbose: bool,
        /// Push the mapping before listing
        #[arg(long)]
        sync: bool,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Show one script's record
    Show {
        name: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Run a script with uv
    Run {
        name: String,
        /// Arguments passed to the script
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        params: Vec<String>,
        /// Fetch the script again instead of using the cache
        #[arg(long)]
        refresh: bool,
        /// Print the command instead of running it
        #[arg(long)]
        dry_run: bool,
    },
    /// Edit a script and upload the change
    Edit {
        name: String,
        /// Editor to use (default: $EDITOR)
        #[arg(long)]
        editor: Option<String>,
    },
    /// Remove a script from the inventory
    Delete {
        name: String,
        /// Skip confirmation prompt
        #[arg(long)]
        force: bool,
    },
    /// Push the local mapping to the remote mirror
    Sync,
    /// Replace the local mapping with the remote mirror
    Pull,
    /// Show data locations and sync state
    Status {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Text to print plus the process exit code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub text: String,
    pub exit_code: i32,
}

impl From<String> for CommandOutput {
    fn from(text: String) -> Self {
        Self { text, exit_code: 0 }
    }
}

/// CLI context: configuration, registry and remote handles for one process.
pub struct CliContext {
    config: SmConfig,
    data_dir: PathBuf,
    registry: ScriptRegistry,
    blobs: Option<Arc<BlockingBlobService>>,
    generator: Option<Arc<dyn ScriptGenerator>>,
    cache: ScriptCache,
}

impl CliContext {
    /// Build from configuration: gist client when a token is available, the
    /// configured conflict policy, then bootstrap.
    pub fn new(config: SmConfig, data_dir: Option<PathBuf>) -> Result<Self, ApiError> {
        let service: Option<Arc<dyn BlobService>> = match config.remote.resolve_token() {
            Some(token) => {
                let client = GistClient::new(&config.remote.api_url, &token)?;
                Some(Arc::new(client) as Arc<dyn BlobService>)
            }
            None => {
                info!("No gist token configured, running with the local mapping only");
                None
            }
        };
        let resolver = prompt::resolver_for(config.sync.conflict_policy);
        Self::with_services(config, data_dir, service, None, resolver.as_ref())
    }

    /// Build with explicit collaborators.
    pub fn with_services(
        config: SmConfig,
        data_dir: Option<PathBuf>,
        service: Option<Arc<dyn BlobService>>,
        generator: Option<Arc<dyn ScriptGenerator>>,
        resolver: &dyn ConflictResolver,
    ) -> Result<Self, ApiError> {
        let data_dir = match data_dir {
            Some(dir) => dir,
            None => config.storage.resolve_data_dir()?,
        };
        let blobs = service
            .map(|s| BlockingBlobService::new(s, config.remote.timeout()).map(Arc::new))
            .transpose()?;
        let mirror = blobs
            .clone()
            .map(|b| Arc::new(MirrorClient::new(b)) as Arc<dyn RemoteMirror>);

        let mut sync = Synchronizer::new(
            LocalStore::in_dir(&data_dir),
            RemoteIdFile::in_dir(&data_dir),
            mirror,
        )?;
        let outcome = sync.setup(resolver)?;
        if !outcome.github_ok && sync.has_remote() {
            warn!("Remote mirror unavailable, continuing with the local mapping");
        }

        Ok(Self {
            registry: ScriptRegistry::new(sync, config.sync.auto_sync),
            cache: ScriptCache::in_dir(&data_dir),
            config,
            data_dir,
            blobs,
            generator,
        })
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache(&self) -> &ScriptCache {
        &self.cache
    }

    pub fn bootstrap_outcome(&self) -> Option<&BootstrapOutcome> {
        self.registry.synchronizer().outcome()
    }

    /// Execute a CLI command
    pub fn execute(&mut self, command: &Commands) -> Result<CommandOutput, ApiError> {
        match command {
            Commands::Create {
                name,
                prompt,
                force,
            } => self.handle_create(name, &prompt.join(" "), *force).map(Into::into),
            Commands::Add {
                name,
                remote_id,
                description,
                tags,
            } => self
                .handle_add(name, remote_id, description.as_deref(), tags)
                .map(Into::into),
            Commands::List {
                verbose,
                sync,
                format,
            } => self.handle_list(*verbose, *sync, *format).map(Into::into),
            Commands::Show { name, format } => self.handle_show(name, *format).map(Into::into),
            Commands::Run {
                name,
                params,
                refresh,
                dry_run,
            } => self.handle_run(name, params, *refresh, *dry_run),
            Commands::Edit { name, editor } => {
                self.handle_edit(name, editor.as_deref()).map(Into::into)
            }
            Commands::Delete { name, force } => self.handle_delete(name, *force).map(Into::into),
            Commands::Sync => self.handle_sync().map(Into::into),
            Commands::Pull => self.handle_pull().map(Into::into),
            Commands::Status { format } => self.handle_status(*format).map(Into::into),
        }
    }

    fn blobs(&self) -> Result<&Arc<BlockingBlobService>, ApiError> {
        self.blobs
            .as_ref()
            .ok_or(ApiError::Remote(RemoteError::NotConfigured))
    }

    fn generator(&self) -> Result<Arc<dyn ScriptGenerator>, ApiError> {
        if let Some(generator) = &self.generator {
            return Ok(Arc::clone(generator));
        }
        let settings = &self.config.generator;
        let generator = OpenAiGenerator::new(
            &settings.endpoint,
            &settings.model,
            &settings.api_key()?,
            settings.timeout(),
        )?;
        Ok(Arc::new(generator))
    }

    fn handle_create(&mut self, name: &str, prompt: &str, force: bool) -> Result<String, ApiError> {
        if !force && self.registry.lookup_script(name).is_some() {
            return Err(ApiError::ScriptExists(name.to_string()));
        }
        let blobs = Arc::clone(self.blobs()?);
        let generator = self.generator()?;

        info!("Generating script '{}'", name);
        let script = blobs.block_on(generator.generate(prompt))?;
        let remote_id = blobs.create_blob(&script_file_name(name), &script.code, &script.description)?;

        let mut metadata = Metadata::new();
        metadata.insert("description".to_string(), json!(script.description));
        metadata.insert("tags".to_string(), json!(script.tags));
        metadata.insert("prompt".to_string(), json!(prompt));
        self.registry.add_script(name, &remote_id, metadata)?;
        let path = self.cache.save(name, &script.code)?;

        Ok(format!(
            "Created script '{}' (gist {})\nCached at {}",
            name,
            remote_id,
            path.display()
        ))
    }

    fn handle_add(
        &mut self,
        name: &str,
        remote_id: &str,
        description: Option<&str>,
        tags: &[String],
    ) -> Result<String, ApiError> {
        let mut metadata = Metadata::new();
        if let Some(description) = description {
            metadata.insert("description".to_string(), json!(description));
        }
        if !tags.is_empty() {
            metadata.insert("tags".to_string(), json!(tags));
        }
        self.registry.add_script(name, remote_id, metadata)?;
        // The old cached source may belong to a different gist.
        self.cache.remove(name)?;
        Ok(format!("Added script '{}' -> {}", name, remote_id))
    }

    fn handle_list(&mut self, verbose: bool, sync: bool, format: OutputFormat) -> Result<String, ApiError> {
        let mut notice = None;
        if sync {
            if let SyncStatus::Failed(err) = self.registry.sync_mapping()? {
                notice = Some(format!("Warning: sync failed ({}), showing local mapping", err));
            }
        }
        let records = self.registry.list_scripts();
        let body = match format {
            OutputFormat::Json => to_json(&records)?,
            OutputFormat::Text => format_records_table(&records, verbose),
        };
        Ok(match notice {
            Some(notice) if format == OutputFormat::Text => format!("{}\n{}", notice, body),
            Some(notice) => {
                warn!("{}", notice);
                body
            }
            None => body,
        })
    }

    fn handle_show(&self, name: &str, format: OutputFormat) -> Result<String, ApiError> {
        let record = self
            .registry
            .get_script_info(name)
            .ok_or_else(|| ApiError::ScriptNotFound(name.to_string()))?;
        match format {
            OutputFormat::Json => to_json(&record),
            OutputFormat::Text => Ok(format_record(&record)),
        }
    }

    /// Cached source for `record`, fetching (and caching) it when needed.
    fn fetch_source(&self, record: &ScriptRecord, refresh: bool) -> Result<(PathBuf, String), ApiError> {
        if !refresh {
            if let Some(content) = self.cache.load(&record.name)? {
                info!("Using cached script {}", self.cache.path_for(&record.name).display());
                return Ok((self.cache.path_for(&record.name), content));
            }
        }
        let blob = self.blobs()?.read_blob(&record.remote_id)?;
        let path = self.cache.save(&record.name, &blob.content)?;
        Ok((path, blob.content))
    }

    fn handle_run(
        &self,
        name: &str,
        params: &[String],
        refresh: bool,
        dry_run: bool,
    ) -> Result<CommandOutput, ApiError> {
        let record = self.registry.require_script(name)?;
        let (path, _) = self.fetch_source(&record, refresh)?;
        if dry_run {
            return Ok(format!("Would run: {}", launcher::uv_command_line(&path, params)).into());
        }
        let exit_code = launcher::run_with_uv(&path, params)?;
        if exit_code != 0 {
            warn!("Script '{}' exited with status {}", name, exit_code);
        }
        Ok(CommandOutput {
            text: String::new(),
            exit_code,
        })
    }

    fn handle_edit(&mut self, name: &str, editor: Option<&str>) -> Result<String, ApiError> {
        let record = self.registry.require_script(name)?;
        let editor = launcher::resolve_editor(editor)?;
        let blobs = Arc::clone(self.blobs()?);
        let blob = blobs.read_blob(&record.remote_id)?;

        let edited = launcher::edit_text(&editor, &blob.content, ".py")?;
        if edited == blob.content {
            self.cache.save(name, &blob.content)?;
            return Ok(format!("No changes to '{}'", name));
        }

        blobs.update_blob(&record.remote_id, &blob.file_name, &edited)?;
        self.cache.save(name, &edited)?;

        // Keep the listed tags in step with the header.
        let tags = header_tags(&edited);
        if tags != record.tags() {
            let mut metadata = record.metadata.clone();
            metadata.insert("tags".to_string(), json!(tags));
            self.registry.update_metadata(name, metadata)?;
        }
        Ok(format!("Updated script '{}' (gist {})", name, record.remote_id))
    }

    fn handle_delete(&mut self, name: &str, force: bool) -> Result<String, ApiError> {
        self.registry.require_script(name)?;
        if !force && !prompt::confirm(&format!("Delete script '{}' from the inventory?", name))? {
            return Ok("Deletion cancelled".to_string());
        }
        if !self.registry.remove_script(name)? {
            return Err(ApiError::ScriptNotFound(name.to_string()));
        }
        self.cache.remove(name)?;
        Ok(format!("Deleted script '{}'", name))
    }

    fn handle_sync(&mut self) -> Result<String, ApiError> {
        match self.registry.sync_mapping()? {
            SyncStatus::Synced { remote_id } => Ok(format!("Mapping synced to gist {}", remote_id)),
            SyncStatus::Failed(err) => Err(ApiError::Remote(err)),
        }
    }

    fn handle_pull(&mut self) -> Result<String, ApiError> {
        match self.registry.sync_from_remote()? {
            SyncStatus::Synced { remote_id } => Ok(format!(
                "Mapping pulled from gist {} ({} scripts)",
                remote_id,
                self.registry.list_scripts().len()
            )),
            SyncStatus::Failed(err) => Err(ApiError::Remote(err)),
        }
    }

    fn handle_status(&self, format: OutputFormat) -> Result<String, ApiError> {
        let sync = self.registry.synchronizer();
        let store = sync.local().read();
        let status = StatusView {
            data_dir: self.data_dir.clone(),
            mapping_file: sync.local().path().to_path_buf(),
            remote_configured: sync.has_remote(),
            remote_id: sync.remote_id().map(str::to_string),
            state: sync.state(),
            bootstrap: sync.outcome().cloned(),
            last_synced_at: store.last_synced_at,
            scripts: store.len(),
        };
        match format {
            OutputFormat::Json => to_json(&status),
            OutputFormat::Text => Ok(format_status_text(&status)),
        }
    }
}

fn script_file_name(name: &str) -> String {
    format!("{}.py", name)
}
