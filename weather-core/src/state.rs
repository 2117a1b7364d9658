use serde::Serialize;

use crate::{error::ErrorInfo, model::NormalizedWeather};

pub const STATUS_CACHED: &str = "Served from cache";
pub const STATUS_LOADED: &str = "Loaded";
pub const STATUS_ERROR: &str = "Error";

/// What the view renders. Only [`FetchController`](crate::FetchController) writes it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FetchState {
    pub data: Option<NormalizedWeather>,
    pub loading: bool,
    pub error: Option<ErrorInfo>,
    pub served_from_cache: bool,
    /// Last city that resolved successfully.
    pub last_query: String,
    /// Short status line: "Served from cache", "Loaded", "Error" or empty.
    pub status_message: String,
}

impl FetchState {
    pub fn is_idle(&self) -> bool {
        !self.loading && self.data.is_none() && self.error.is_none()
    }
}
