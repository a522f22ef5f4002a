//! Viewport emulation.

use tracing::debug;

use crate::error::Result;
use crate::protocol::{Command, EmulationCommand, Viewport};

use super::Page;

impl Page {
    /// Overrides the page's viewport metrics.
    pub async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        debug!(
            target_id = %self.target_id(),
            width = viewport.width,
            height = viewport.height,
            "Setting viewport"
        );

        self.send_command(Command::Emulation(EmulationCommand::SetDeviceMetricsOverride(
            viewport,
        )))
        .await?;
        Ok(())
    }
}
