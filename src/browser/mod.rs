//! Browser automation client: the seam to the (out-of-scope) headless
//! browser worker.

pub mod client;
pub mod error;

pub use client::{
    AutofillData, AutomationStatus, AutomationStatusResponse, BrowserAutomationClient,
    CheckStatusResponse, HttpBrowserClient, NewCredentials, PortalStatus, StartAutomationRequest,
};
pub use error::BrowserError;
