use crate::auth::AuthTable;
use crate::config::AppConfig;
use crate::store::TenantStore;

pub struct AppState {
    pub store: TenantStore,
    pub auth: AuthTable,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(config: AppConfig, auth: AuthTable) -> Self {
        Self {
            store: TenantStore::new(config.data_dir.clone(), config.pool_size),
            auth,
            config,
        }
    }

    /// Make sure every tenant in the auth table has a namespace directory.
    pub fn prepare_tenants(&self) -> anyhow::Result<()> {
        for tenant in self.auth.tenants() {
            self.store.ensure_tenant(tenant)?;
        }
        Ok(())
    }
}
