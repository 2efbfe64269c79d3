#![allow(dead_code)]

pub mod fake_browser;
pub mod http;
pub mod mock_backend;
pub mod scripted_ui;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use parsagon::engine::error::Result;
use parsagon::engine::executor::{Executor, ExecutorConfig};
use parsagon::flows::{EngineLauncher, FlowContext};

use fake_browser::FakeBrowser;
use mock_backend::{MockAssist, MockStore};
use scripted_ui::ScriptedUi;

/// No sleeping, one attempt per interaction, nothing killed on teardown.
pub fn test_config(infer: bool) -> ExecutorConfig {
    ExecutorConfig {
        infer,
        retries: 1,
        helper_processes: vec![],
        ..ExecutorConfig::default()
    }
    .without_delays()
}

pub fn executor(
    browser: &FakeBrowser,
    assist: &Arc<MockAssist>,
    ui: &Arc<ScriptedUi>,
    infer: bool,
) -> Executor {
    Executor::new(
        browser.boxed(),
        assist.clone(),
        ui.clone(),
        test_config(infer),
    )
}

/// Hands out executors over the shared fake browser.
pub struct TestLauncher {
    pub browser: FakeBrowser,
    pub assist: Arc<MockAssist>,
    pub ui: Arc<ScriptedUi>,
    /// (headless, infer) of every launch
    pub launches: Mutex<Vec<(bool, bool)>>,
}

impl EngineLauncher for TestLauncher {
    fn launch(&self, headless: bool, infer: bool) -> Result<Executor> {
        self.launches.lock().unwrap().push((headless, infer));
        Ok(executor(&self.browser, &self.assist, &self.ui, infer))
    }
}

/// Everything a flow test needs to inspect afterwards.
pub struct FlowFixture {
    pub ctx: FlowContext,
    pub browser: FakeBrowser,
    pub assist: Arc<MockAssist>,
    pub store: Arc<MockStore>,
    pub ui: Arc<ScriptedUi>,
}

pub fn flow_fixture(
    browser: FakeBrowser,
    assist: MockAssist,
    store: MockStore,
    ui: ScriptedUi,
) -> FlowFixture {
    let assist = Arc::new(assist);
    let store = Arc::new(store);
    let ui = Arc::new(ui);
    let launcher = TestLauncher {
        browser: browser.clone(),
        assist: assist.clone(),
        ui: ui.clone(),
        launches: Mutex::new(vec![]),
    };
    let ctx = FlowContext {
        assist: assist.clone(),
        store: store.clone(),
        ui: ui.clone(),
        launcher: Box::new(launcher),
        poll_interval: Duration::ZERO,
        verbose: false,
    };
    FlowFixture {
        ctx,
        browser,
        assist,
        store,
        ui,
    }
}
