//! Apps described by definition files.

use crate::error::{Error, Result};
use crate::resolve;
use crate::{AppConfig, AppDiscoverer, ConfigSource};
use async_trait::async_trait;
use hangar_core::api::App;
use hangar_core::definitions::is_app_def;
use hangar_core::{ApiClient, AppDefinition, paths};
use std::path::Path;
use std::sync::Arc;

/// Decides what happens when an app definition's app does not exist remotely.
#[async_trait]
pub trait MissingAppHandler: Send + Sync {
    /// Returns the app to deploy to, or `None` to skip the definition.
    ///
    /// # Errors
    ///
    /// Errors abort discovery.
    async fn handle_missing(
        &self,
        client: &dyn ApiClient,
        env_slug: Option<&str>,
        def: &AppDefinition,
    ) -> Result<Option<App>>;
}

/// Discovers apps from `*.app.{yaml,yml,json}` files.
pub struct AppDefnDiscoverer {
    client: Arc<dyn ApiClient>,
    env_slug: Option<String>,
    missing_app_handler: Option<Arc<dyn MissingAppHandler>>,
}

impl AppDefnDiscoverer {
    /// Creates a discoverer that skips apps missing remotely.
    #[must_use]
    pub fn new(client: Arc<dyn ApiClient>) -> Self {
        Self {
            client,
            env_slug: None,
            missing_app_handler: None,
        }
    }

    /// Looks apps up in the given environment.
    #[must_use]
    pub fn with_env_slug(mut self, env_slug: Option<String>) -> Self {
        self.env_slug = env_slug;
        self
    }

    /// Handles apps missing remotely instead of skipping them.
    #[must_use]
    pub fn with_missing_app_handler(mut self, handler: Arc<dyn MissingAppHandler>) -> Self {
        self.missing_app_handler = Some(handler);
        self
    }

    async fn remote_app(&self, def: &AppDefinition) -> Result<Option<App>> {
        let client = self.client.as_ref();
        let env_slug = self.env_slug.as_deref();
        let app = match client.get_app(&def.slug, env_slug).await {
            Ok(app) => app,
            Err(err) if err.is_not_found() => {
                let created = match &self.missing_app_handler {
                    Some(handler) => handler.handle_missing(client, env_slug, def).await?,
                    None => None,
                };
                let Some(app) = created else {
                    tracing::warn!(slug = %def.slug, "App does not exist, skipping deployment");
                    return Ok(None);
                };
                app
            }
            Err(source) => return Err(Error::api("app", &def.slug, source)),
        };
        if app.is_archived {
            tracing::warn!(slug = %app.slug, "App is archived, skipping deployment");
            return Ok(None);
        }
        Ok(Some(app))
    }
}

#[async_trait]
impl AppDiscoverer for AppDefnDiscoverer {
    async fn app_config(&self, file: &Path) -> Result<Option<AppConfig>> {
        if !is_app_def(file) {
            return Ok(None);
        }
        let defn_path = paths::absolute(file)?;
        let bytes = tokio::fs::read(&defn_path)
            .await
            .map_err(|e| Error::io(e, &defn_path, "read app definition"))?;
        let def = AppDefinition::parse_file(&defn_path, &bytes)?;

        let root = defn_path
            .parent()
            .map_or_else(|| defn_path.clone(), Path::to_path_buf);
        let entrypoint = paths::clean(&root.join(&def.entrypoint));
        if !resolve::exists(&entrypoint).await? {
            return Err(Error::EntrypointNotFound { defn_path, entrypoint });
        }

        let Some(app) = self.remote_app(&def).await? else {
            return Ok(None);
        };

        tracing::debug!(slug = %def.slug, defn = %defn_path.display(), "Discovered app definition");
        Ok(Some(AppConfig {
            id: app.id,
            slug: def.slug,
            root,
            entrypoint,
            source: ConfigSource::Defn,
        }))
    }

    fn config_source(&self) -> ConfigSource {
        ConfigSource::Defn
    }
}
