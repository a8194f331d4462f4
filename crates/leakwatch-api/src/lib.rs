// leakwatch-api: Async Rust client for the Leakwatch leak-monitoring backend

pub mod alerts;
mod auth;
pub mod client;
mod endpoints;
pub mod error;
pub mod forms;
pub mod models;
pub mod session;
pub mod transport;

pub use alerts::{AlertListener, LeakAlert, ListenerConfig, ListenerState};
pub use client::ApiClient;
pub use error::Error;
pub use forms::{
    CommandRequest, EmailVerificationForm, EspRegistration, PasswordResetConfirm,
    PasswordResetRequest, RegistrationForm, ScheduleRequest,
};
pub use models::{
    Ack, CommandRecord, DeviceLocation, LeakQuery, LeakRecord, LeakStatus, Page, RecordId,
    RegionCount, RegionFilter, Schedule, ScheduleStatus, Severity, User, ValveAction,
    WaterReading,
};
pub use session::{AuthState, MemorySessionStore, Session, SessionStore, StoredSession};
pub use transport::{TlsMode, TransportConfig};
