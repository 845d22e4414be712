//! Home Assistant Rust Server
//!
//! Runs the Home Connect Alt integration against appliances loaded from a
//! JSON fixture, with writes looped back into the fixture appliances.
//!
//! Usage: `homeassistant [configuration.yaml] [appliances.json]`

mod loopback;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context as _, Result};
use ha_core::events::{StateChangedData, HOMEASSISTANT_START, HOMEASSISTANT_STOP};
use ha_core::{Context, Event};
use ha_entity_platform::HomeAssistant;
use home_connect_alt::{load_config_file, HomeConnectAlt, IntegrationConfig};
use home_connect_api::{Appliance, ApplianceData, HomeConnect};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::loopback::LoopbackApi;

const DEFAULT_CONFIG: &str = "configuration.yaml";
const DEFAULT_APPLIANCES: &str = "appliances.json";

fn load_config(path: &Path) -> Result<IntegrationConfig> {
    if !path.exists() {
        warn!("No configuration at {:?}, using defaults", path);
        return Ok(IntegrationConfig::default());
    }
    load_config_file(path).with_context(|| format!("loading {}", path.display()))
}

fn load_appliances(path: &Path, homeconnect: &Arc<HomeConnect>) -> Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading appliances from {}", path.display()))?;
    let appliances: Vec<ApplianceData> = serde_json::from_str(&content)
        .with_context(|| format!("parsing appliances in {}", path.display()))?;

    let count = appliances.len();
    for data in appliances {
        let api = Arc::new(LoopbackApi::new(Arc::downgrade(homeconnect)));
        homeconnect.pair(Arc::new(Appliance::new(data, api)));
    }
    Ok(count)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Home Assistant (Rust)");

    let mut args = std::env::args().skip(1);
    let config_path = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_CONFIG.to_string()));
    let appliances_path =
        PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_APPLIANCES.to_string()));

    let hass = HomeAssistant::new();
    let config = load_config(&config_path)?;

    // Log every state change the integration publishes
    let mut state_changes = hass.bus.subscribe_typed::<StateChangedData>();
    tokio::spawn(async move {
        loop {
            match state_changes.recv().await {
                Ok(event) => match event.data.new_state {
                    Some(state) => {
                        info!(entity_id = %event.data.entity_id, state = %state.state, "State changed")
                    }
                    None => info!(entity_id = %event.data.entity_id, "Entity removed"),
                },
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "State change log lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let homeconnect = Arc::new(HomeConnect::new());
    let integration = HomeConnectAlt::setup(&hass, homeconnect.clone(), config);
    let count = load_appliances(&appliances_path, &homeconnect)?;

    hass.bus
        .fire(Event::new(HOMEASSISTANT_START, serde_json::json!({}), Context::new()));
    info!(
        appliances = count,
        numbers = integration.numbers.len(),
        switches = integration.switches.len(),
        "Home Assistant is running"
    );

    // Keep the server running
    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    integration.unload(&hass);
    hass.bus
        .fire(Event::new(HOMEASSISTANT_STOP, serde_json::json!({}), Context::new()));

    Ok(())
}
