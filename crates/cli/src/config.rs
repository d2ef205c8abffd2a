//! Start-up configuration.
//!
//! Every setting is a flag with an environment-variable fallback. Required
//! settings have no default, so a missing value stops start-up before the
//! server binds.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use github::GithubClientConfig;
use pipeline::{
    ConfigurationError, Credentials, Owner, PackageName, RemotePath, RepoName, RepositoryRef,
};
use registry::NpmRegistryConfig;
use stages::PipelineConfig;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Human-readable, for local runs.
    Pretty,
}

/// Mirror upstream releases into a repository and publish them to a package
/// registry.
#[derive(Parser, Clone)]
#[command(name = "release-relay", version, about)]
pub struct Args {
    /// Mirror repository owner.
    #[arg(long, env = "OWNER")]
    pub owner: String,

    /// Mirror repository name.
    #[arg(long, env = "REPO")]
    pub repo: String,

    /// Registry package name.
    #[arg(long, env = "PACKAGE_NAME")]
    pub package_name: String,

    /// Shared secret used to sign webhook deliveries.
    #[arg(long, env = "SECRET", hide_env_values = true)]
    pub secret: String,

    /// GitHub token with write access to the mirror repository.
    #[arg(long, env = "TOKEN", hide_env_values = true)]
    pub token: String,

    /// Registry `_auth` credential.
    #[arg(long, env = "NPM_AUTH", hide_env_values = true)]
    pub registry_token: String,

    /// Registry contact email.
    #[arg(long, env = "NPM_EMAIL")]
    pub email: String,

    /// Registry credential file; written once if absent.
    #[arg(long, env = "NPMRC_PATH")]
    pub credentials_path: PathBuf,

    #[arg(long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    #[arg(long, env = "GITHUB_API_URL", default_value = github::DEFAULT_API_URL)]
    pub github_api_url: String,

    #[arg(long, env = "REGISTRY_URL", default_value = registry::DEFAULT_REGISTRY_URL)]
    pub registry_url: String,

    /// Manifest path in the mirror repository.
    #[arg(long, env = "MANIFEST_PATH", default_value = "package.json")]
    pub manifest_path: String,

    /// Type-definition path in the mirror repository.
    #[arg(long, env = "TYPEDEF_PATH", default_value = "electron.d.ts")]
    pub typedef_path: String,

    /// Type-definition asset name on the upstream release.
    #[arg(long, env = "TYPEDEF_ASSET", default_value = "electron.d.ts")]
    pub typedef_asset: String,

    /// Timeout for each remote call, in seconds.
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Json)]
    pub log_format: LogFormat,
}

impl std::fmt::Debug for Args {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Args")
            .field("owner", &self.owner)
            .field("repo", &self.repo)
            .field("package_name", &self.package_name)
            .field("secret", &"<redacted>")
            .field("token", &"<redacted>")
            .field("registry_token", &"<redacted>")
            .field("email", &self.email)
            .field("credentials_path", &self.credentials_path)
            .field("port", &self.port)
            .field("github_api_url", &self.github_api_url)
            .field("registry_url", &self.registry_url)
            .field("manifest_path", &self.manifest_path)
            .field("typedef_path", &self.typedef_path)
            .field("typedef_asset", &self.typedef_asset)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("log_format", &self.log_format)
            .finish()
    }
}

fn required<T>(value: Option<T>, name: &str) -> Result<T, ConfigurationError> {
    value.ok_or_else(|| ConfigurationError::new(format!("{name} must not be empty")))
}

impl Args {
    pub fn timeout(&self) -> Result<Duration, ConfigurationError> {
        if self.request_timeout_secs == 0 {
            return Err(ConfigurationError::new(
                "request timeout must be at least one second",
            ));
        }
        Ok(Duration::from_secs(self.request_timeout_secs))
    }

    pub fn pipeline_config(&self) -> Result<PipelineConfig, ConfigurationError> {
        let mirror = RepositoryRef::new(
            required(Owner::new(self.owner.trim()), "owner")?,
            required(RepoName::new(self.repo.trim()), "repo")?,
        );
        let typedef_asset = self.typedef_asset.trim();
        if typedef_asset.is_empty() {
            return Err(ConfigurationError::new("typedef asset must not be empty"));
        }
        if self.registry_token.trim().is_empty() {
            return Err(ConfigurationError::new("registry token must not be empty"));
        }

        Ok(PipelineConfig {
            mirror,
            package: required(PackageName::new(self.package_name.trim()), "package name")?,
            manifest_path: required(RemotePath::new(self.manifest_path.trim()), "manifest path")?,
            typedef_path: required(RemotePath::new(self.typedef_path.trim()), "typedef path")?,
            typedef_asset: typedef_asset.to_string(),
            credentials: Credentials {
                registry_token: self.registry_token.trim().to_string(),
                contact_email: self.email.trim().to_string(),
            },
        })
    }

    pub fn github_config(&self) -> Result<GithubClientConfig, ConfigurationError> {
        Ok(GithubClientConfig {
            api_url: self.github_api_url.clone(),
            token: self.token.clone(),
            timeout: self.timeout()?,
        })
    }

    pub fn registry_config(&self) -> Result<NpmRegistryConfig, ConfigurationError> {
        Ok(NpmRegistryConfig {
            registry_url: self.registry_url.clone(),
            timeout: self.timeout()?,
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
