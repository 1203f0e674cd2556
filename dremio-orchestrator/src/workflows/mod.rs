use crate::gateway::GatewayClient;
use crate::pacing::Pacing;
use dremio_providers::CloudProvider;

pub mod deploy;
pub mod describe;
pub mod project;
pub mod upgrade;

/// What every workflow runs against: one provider session, one gateway client.
pub struct Session<'a> {
    pub provider: &'a dyn CloudProvider,
    pub gateway: &'a GatewayClient,
    pub pacing: Pacing,
}

impl<'a> Session<'a> {
    pub fn new(provider: &'a dyn CloudProvider, gateway: &'a GatewayClient, pacing: Pacing) -> Self {
        Self {
            provider,
            gateway,
            pacing,
        }
    }
}
