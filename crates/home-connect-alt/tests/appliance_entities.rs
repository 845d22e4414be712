//! End-to-end behaviour of the integration on a host
//!
//! Appliances are driven through the client (`pair`, `select_program`,
//! `depair`, update mutators) and the results are observed in the state
//! store and through service calls, the way a user would see them.

use std::sync::Arc;

use ha_core::Context;
use ha_entity_platform::HomeAssistant;
use home_connect_alt::{
    load_config_str, HomeConnectAlt, IntegrationConfig, LifecycleState, OptionEntityPolicy,
};
use home_connect_api::mock::{ApiCall, RecordingApi};
use home_connect_api::{
    Appliance, ApplianceData, HomeConnect, HomeConnectError, Parameter, Program, ValueType,
    REMOTE_CONTROL_ACTIVE,
};
use serde_json::json;

const DISHWASHER: &str = "SIEMENS-SN658X06TE";
const OVEN: &str = "BOSCH-HBG634BS1";
const COFFEE_MAKER: &str = "SIEMENS-TI9575X1DE";

const ECO_SWITCH: &str = "switch.siemens_sn658x06te_dishwasher_option_ecomode";
const TEMPERATURE_NUMBER: &str = "number.siemens_sn658x06te_dishwasher_program_temperature";

fn dishwasher(api: Arc<RecordingApi>) -> Arc<Appliance> {
    let data = ApplianceData::new(DISHWASHER, "Dishwasher")
        .with_setting(
            Parameter::new("Dishwasher.Option.EcoMode", json!(false)).with_type(ValueType::Boolean),
        )
        .with_setting(
            Parameter::new("BSH.Common.Setting.PowerState", json!(true))
                .with_type(ValueType::Boolean),
        )
        .with_program(Program::new(
            "Dishwasher.Program.Eco50",
            [
                Parameter::new("Dishwasher.Program.Temperature", json!(50))
                    .with_type(ValueType::Int)
                    .with_range(40.0, 70.0, 5.0)
                    .with_unit("°C"),
                Parameter::new("BSH.Common.Option.RemainingProgramTime", json!(3600))
                    .with_type(ValueType::Int),
            ],
        ))
        .with_program(Program::new(
            "Dishwasher.Program.Quick45",
            [Parameter::new("Dishwasher.Option.ExtraDry", json!(false))],
        ));
    Arc::new(Appliance::new(data, api))
}

fn oven(api: Arc<RecordingApi>) -> Arc<Appliance> {
    let data = ApplianceData::new(OVEN, "Oven")
        .with_setting(Parameter::new("Cooking.Oven.Setting.ChildLock", json!(false)))
        .with_program(Program::new(
            "Cooking.Oven.Program.HeatingMode.HotAir",
            [Parameter::new("Cooking.Oven.Option.SetpointTemperature", json!(180))
                .with_type(ValueType::Int)
                .with_range(30.0, 250.0, 5.0)
                .with_unit("°C")],
        ));
    Arc::new(Appliance::new(data, api))
}

struct Harness {
    hass: HomeAssistant,
    homeconnect: Arc<HomeConnect>,
    api: Arc<RecordingApi>,
    integration: HomeConnectAlt,
}

fn harness(config: IntegrationConfig, preload: bool) -> Harness {
    let hass = HomeAssistant::new();
    let homeconnect = Arc::new(HomeConnect::new());
    let api = Arc::new(RecordingApi::new());
    if preload {
        homeconnect.pair(dishwasher(api.clone()));
    }
    let integration = HomeConnectAlt::setup(&hass, homeconnect.clone(), config);
    Harness {
        hass,
        homeconnect,
        api,
        integration,
    }
}

impl Harness {
    fn state(&self, entity_id: &str) -> Option<String> {
        self.hass.states.get_state(entity_id)
    }

    async fn call(&self, domain: &str, service: &str, data: serde_json::Value) -> Result<(), String> {
        self.hass
            .services
            .call(domain, service, data, Context::new(), false)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[test]
fn test_appliances_known_before_setup_are_scanned() {
    let h = harness(IntegrationConfig::default(), true);

    assert_eq!(h.integration.numbers.len(), 1);
    assert_eq!(h.integration.switches.len(), 2);
    assert!(h.state(TEMPERATURE_NUMBER).is_some());
    assert!(h.state(ECO_SWITCH).is_some());
    assert!(h
        .state("switch.siemens_sn658x06te_dishwasher_option_extradry")
        .is_some());
}

#[test]
fn test_ignored_keys_are_not_exposed() {
    let h = harness(IntegrationConfig::default(), true);

    assert!(h
        .state("switch.siemens_sn658x06te_bsh_common_setting_powerstate")
        .is_none());
    assert!(h
        .state("number.siemens_sn658x06te_bsh_common_option_remainingprogramtime")
        .is_none());

    let config = load_config_str(
        "home_connect_alt:\n  extra_ignore:\n    - Dishwasher.Option.EcoMode\n",
    )
    .unwrap();
    let h = harness(config, true);
    assert!(h.state(ECO_SWITCH).is_none());
}

#[test]
fn test_dishwasher_example_state() {
    let h = harness(IntegrationConfig::default(), true);

    let eco = h.hass.states.get(ECO_SWITCH).unwrap();
    assert_eq!(eco.state, "off");
    assert_eq!(eco.attribute::<String>("icon").as_deref(), Some("mdi:tune"));
    assert_eq!(
        eco.attribute::<String>("device_class").as_deref(),
        Some("home_connect_alt__settings")
    );
    assert_eq!(
        eco.attribute::<String>("friendly_name").as_deref(),
        Some("Dishwasher Dishwasher.Option.EcoMode")
    );

    // No program selected yet
    assert_eq!(h.state(TEMPERATURE_NUMBER).as_deref(), Some("unavailable"));

    h.homeconnect
        .select_program(DISHWASHER, "Dishwasher.Program.Eco50");
    let temperature = h.hass.states.get(TEMPERATURE_NUMBER).unwrap();
    assert_eq!(temperature.state, "50");
    assert_eq!(temperature.attribute::<f64>("min"), Some(40.0));
    assert_eq!(temperature.attribute::<f64>("max"), Some(70.0));
    assert_eq!(temperature.attribute::<f64>("step"), Some(5.0));
    assert_eq!(
        temperature.attribute::<String>("unit_of_measurement").as_deref(),
        Some("°C")
    );
}

#[tokio::test]
async fn test_dishwasher_example_write() {
    let h = harness(IntegrationConfig::default(), true);
    h.homeconnect
        .select_program(DISHWASHER, "Dishwasher.Program.Eco50");

    h.call(
        "number",
        "set_value",
        json!({"entity_id": TEMPERATURE_NUMBER, "value": 55.0}),
    )
    .await
    .unwrap();

    assert_eq!(
        h.api.last_call(),
        Some(ApiCall::SetOption {
            ha_id: DISHWASHER.to_string(),
            key: "Dishwasher.Program.Temperature".to_string(),
            value: json!(55),
        })
    );
}

#[test]
fn test_option_availability_follows_program() {
    let h = harness(IntegrationConfig::default(), true);
    let extra_dry = "switch.siemens_sn658x06te_dishwasher_option_extradry";

    h.homeconnect
        .select_program(DISHWASHER, "Dishwasher.Program.Eco50");
    assert_eq!(h.state(TEMPERATURE_NUMBER).as_deref(), Some("50"));
    assert_eq!(h.state(extra_dry).as_deref(), Some("unavailable"));

    h.homeconnect
        .select_program(DISHWASHER, "Dishwasher.Program.Quick45");
    assert_eq!(h.state(TEMPERATURE_NUMBER).as_deref(), Some("unavailable"));
    assert_eq!(h.state(extra_dry).as_deref(), Some("off"));
    assert_eq!(
        h.integration.switch_discovery().lifecycle_state(DISHWASHER),
        LifecycleState::ProgramSelected("Dishwasher.Program.Quick45".to_string())
    );
}

#[test]
fn test_updates_are_published() {
    let h = harness(IntegrationConfig::default(), true);
    let appliance = h.homeconnect.appliance(DISHWASHER).unwrap();

    appliance.update_setting("Dishwasher.Option.EcoMode", json!(true));
    assert_eq!(h.state(ECO_SWITCH).as_deref(), Some("on"));

    h.homeconnect
        .select_program(DISHWASHER, "Dishwasher.Program.Eco50");
    appliance.update_option("Dishwasher.Program.Temperature", json!(65));
    assert_eq!(h.state(TEMPERATURE_NUMBER).as_deref(), Some("65"));

    appliance.set_connected(false);
    assert_eq!(h.state(ECO_SWITCH).as_deref(), Some("unavailable"));
}

#[test]
fn test_remote_control_inactive_blocks_setting_switches() {
    let h = harness(IntegrationConfig::default(), true);
    let appliance = h.homeconnect.appliance(DISHWASHER).unwrap();
    assert_eq!(h.state(ECO_SWITCH).as_deref(), Some("off"));

    appliance.update_status(REMOTE_CONTROL_ACTIVE, json!(false));
    assert_eq!(h.state(ECO_SWITCH).as_deref(), Some("unavailable"));

    appliance.update_status(REMOTE_CONTROL_ACTIVE, json!(true));
    assert_eq!(h.state(ECO_SWITCH).as_deref(), Some("off"));
}

#[test]
fn test_depaired_removes_only_that_appliance() {
    let h = harness(IntegrationConfig::default(), true);
    h.homeconnect.pair(oven(h.api.clone()));
    let oven_number = "number.bosch_hbg634bs1_cooking_oven_option_setpointtemperature";
    let oven_switch = "switch.bosch_hbg634bs1_cooking_oven_setting_childlock";
    assert!(h.state(oven_number).is_some());
    assert!(h.state(oven_switch).is_some());

    let appliance = h.homeconnect.appliance(DISHWASHER).unwrap();
    h.homeconnect.depair(DISHWASHER);

    assert!(h.state(ECO_SWITCH).is_none());
    assert!(h.state(TEMPERATURE_NUMBER).is_none());
    assert!(h.state(oven_number).is_some());
    assert!(h.state(oven_switch).is_some());
    assert_eq!(h.integration.numbers.len(), 1);
    assert_eq!(h.integration.switches.len(), 1);
    assert_eq!(appliance.listener_count(), 0);
}

#[test]
fn test_rescans_do_not_duplicate() {
    for policy in [OptionEntityPolicy::UpdateInPlace, OptionEntityPolicy::Recreate] {
        let config = IntegrationConfig {
            option_entity_policy: policy,
            ..IntegrationConfig::default()
        };
        let h = harness(config, true);
        let appliance = h.homeconnect.appliance(DISHWASHER).unwrap();

        for program in [
            "Dishwasher.Program.Eco50",
            "Dishwasher.Program.Quick45",
            "Dishwasher.Program.Eco50",
        ] {
            h.homeconnect.select_program(DISHWASHER, program);
        }
        h.homeconnect.pair(appliance.clone());

        assert_eq!(h.integration.numbers.len(), 1, "{:?}", policy);
        assert_eq!(h.integration.switches.len(), 2, "{:?}", policy);
        // One listener per entity key, plus the selected-program and
        // remote-control subscriptions
        assert_eq!(appliance.listener_count(), 6, "{:?}", policy);
    }
}

#[tokio::test]
async fn test_repaired_appliance_object_takes_over() {
    for policy in [OptionEntityPolicy::UpdateInPlace, OptionEntityPolicy::Recreate] {
        let config = IntegrationConfig {
            option_entity_policy: policy,
            ..IntegrationConfig::default()
        };
        let h = harness(config, true);
        let stale = h.homeconnect.appliance(DISHWASHER).unwrap();
        assert_eq!(h.state(ECO_SWITCH).as_deref(), Some("off"));

        // Same id, new object with its own transport and data
        let api = Arc::new(RecordingApi::new());
        let fresh = dishwasher(api.clone());
        fresh.update_setting("Dishwasher.Option.EcoMode", json!(true));
        h.homeconnect.pair(fresh.clone());

        assert_eq!(h.state(ECO_SWITCH).as_deref(), Some("on"), "{:?}", policy);
        assert_eq!(stale.listener_count(), 0, "{:?}", policy);
        assert_eq!(fresh.listener_count(), 6, "{:?}", policy);
        assert_eq!(h.integration.switches.len(), 2);

        fresh.update_setting("Dishwasher.Option.EcoMode", json!(false));
        assert_eq!(h.state(ECO_SWITCH).as_deref(), Some("off"), "{:?}", policy);

        h.homeconnect
            .select_program(DISHWASHER, "Dishwasher.Program.Eco50");
        fresh.update_option("Dishwasher.Program.Temperature", json!(45));
        assert_eq!(h.state(TEMPERATURE_NUMBER).as_deref(), Some("45"));

        h.call("switch", "turn_on", json!({"entity_id": ECO_SWITCH}))
            .await
            .unwrap();
        assert!(matches!(api.last_call(), Some(ApiCall::ApplySetting { .. })));
        assert!(h.api.calls().is_empty(), "{:?}", policy);
    }
}

#[tokio::test]
async fn test_fractional_option_is_sent_unchanged() {
    let h = harness(IntegrationConfig::default(), false);
    let data = ApplianceData::new(COFFEE_MAKER, "Coffee machine").with_program(Program::new(
        "ConsumerProducts.CoffeeMaker.Program.Beverage.Coffee",
        [Parameter::new(
            "ConsumerProducts.CoffeeMaker.Option.CoffeeTemperaturePercent",
            json!(90.0),
        )
        .with_type(ValueType::Double)
        .with_range(80.0, 100.0, 0.5)
        .with_unit("%")],
    ));
    h.homeconnect
        .pair(Arc::new(Appliance::new(data, h.api.clone())));
    h.homeconnect.select_program(
        COFFEE_MAKER,
        "ConsumerProducts.CoffeeMaker.Program.Beverage.Coffee",
    );

    let entity_id =
        "number.siemens_ti9575x1de_consumerproducts_coffeemaker_option_coffeetemperaturepercent";
    assert_eq!(h.state(entity_id).as_deref(), Some("90"));

    h.call(
        "number",
        "set_value",
        json!({"entity_id": entity_id, "value": 92.5}),
    )
    .await
    .unwrap();

    assert_eq!(
        h.api.last_call(),
        Some(ApiCall::SetOption {
            ha_id: COFFEE_MAKER.to_string(),
            key: "ConsumerProducts.CoffeeMaker.Option.CoffeeTemperaturePercent".to_string(),
            value: json!(92.5),
        })
    );
}

#[tokio::test]
async fn test_service_errors_reach_the_caller() {
    let h = harness(IntegrationConfig::default(), true);

    h.api.fail_key(
        "Dishwasher.Option.EcoMode",
        HomeConnectError::with_description("SDK.Error.Locked", "Child lock active"),
    );
    let err = h
        .call("switch", "turn_on", json!({"entity_id": ECO_SWITCH}))
        .await
        .unwrap_err();
    assert!(err.contains(
        "Failed to apply the setting: Child lock active (SDK.Error.Locked - Dishwasher.Option.EcoMode)"
    ));

    let err = h
        .call("switch", "turn_off", json!({"entity_id": ECO_SWITCH}))
        .await
        .unwrap_err();
    assert!(err.contains("Child lock active (SDK.Error.Locked)"));
    assert!(!err.contains("Failed to apply"));
}

#[test]
fn test_appliance_paired_after_setup() {
    let h = harness(IntegrationConfig::default(), false);
    assert!(h.integration.numbers.is_empty());

    h.homeconnect.pair(dishwasher(h.api.clone()));
    assert_eq!(h.integration.numbers.len(), 1);
    assert_eq!(
        h.integration.number_discovery().lifecycle_state(DISHWASHER),
        LifecycleState::PairedNoProgram
    );
}

#[test]
fn test_unload_removes_everything() {
    let h = harness(IntegrationConfig::default(), true);
    h.integration.unload(&h.hass);

    assert!(h.integration.numbers.is_empty());
    assert!(h.integration.switches.is_empty());
    assert!(!h.hass.services.has_service("number", "set_value"));

    // Later events are no longer handled
    h.homeconnect.pair(oven(h.api.clone()));
    assert!(h.integration.numbers.is_empty());
}
