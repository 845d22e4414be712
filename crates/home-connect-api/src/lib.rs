//! Home Connect appliance client model
//!
//! This crate models the part of the Home Connect client library that the
//! integration consumes:
//!
//! - [`HomeConnect`]: the collection of known appliances, which emits
//!   [`Events::Paired`], [`Events::ProgramSelected`] and [`Events::Depaired`]
//! - [`Appliance`]: one device with its settings, programs, selected program
//!   and status, plus per-key update listeners
//! - [`ApplianceApi`]: the transport behind the two async mutators,
//!   `set_option` and `apply_setting`
//!
//! The cloud connection, authentication and event stream are not part of
//! this crate; whatever drives them mutates appliances through the
//! `update_*` methods and pairs/depairs them on the collection.

mod appliance;
mod client;
mod error;
pub mod mock;
mod model;

pub use appliance::{Appliance, ApplianceApi, ListenerId, UpdateHandler};
pub use client::{CallbackId, EventHandler, Events, HomeConnect};
pub use error::{HomeConnectError, HomeConnectResult};
pub use model::{ApplianceData, Constraints, Parameter, Program, ValueType};

/// Status key reporting whether the appliance accepts remote writes
pub const REMOTE_CONTROL_ACTIVE: &str = "BSH.Common.Status.RemoteControlActive";

/// Key announced to update listeners when a program gets selected
pub const SELECTED_PROGRAM: &str = "BSH.Common.Root.SelectedProgram";
