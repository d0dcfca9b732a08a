// src/state.rs

use axum::extract::FromRef;

use crate::{
    config::{Config, ExamPolicy},
    services::attempt::AttemptEngine,
    store::DynStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub config: Config,
}

impl AppState {
    pub fn new(store: DynStore, config: Config) -> Self {
        Self { store, config }
    }
}

impl FromRef<AppState> for DynStore {
    fn from_ref(state: &AppState) -> Self {
        state.store.clone()
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

impl FromRef<AppState> for ExamPolicy {
    fn from_ref(state: &AppState) -> Self {
        state.config.exam
    }
}

impl FromRef<AppState> for AttemptEngine {
    fn from_ref(state: &AppState) -> Self {
        AttemptEngine::new(state.store.clone(), state.config.exam)
    }
}
