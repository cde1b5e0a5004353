//! The deferrable page: five widgets, each behind its own trigger.
//!
//! The script plays the part of the host. It reports idle time, scrolls the
//! chart into view, clicks the table button and hovers the map, then waits
//! for the weather timer. Every fragment is rendered by an effect, so each
//! state change prints as it happens.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use trellis_core::config::DeferConfig;
use trellis_core::defer::{DeferController, DeferredFragment, FragmentState, HostEvent, Trigger};
use trellis_core::error::{DeferError, LoadError};
use trellis_core::reactive::{flush_effects, Owner};

use crate::widgets::{ChartData, DataTable, MapWidget, WeatherWidget, Widget};

pub const FRAGMENT_NAMES: [&str; 5] = ["chart", "data-table", "map", "weather", "prefetch"];

const TABLE_BUTTON: &str = "dataTableTrigger";
const MAP_CONTAINER: &str = "mapContainer";
const POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub timer: Duration,
    pub latency: Duration,
    /// Name of the fragment whose loader should fail.
    pub fail: Option<String>,
}

impl Default for DemoOptions {
    fn default() -> Self {
        Self {
            timer: Duration::from_millis(10_000),
            latency: Duration::from_millis(300),
            fail: None,
        }
    }
}

/// What a fragment shows while it is not ready.
struct Texts {
    placeholder: &'static str,
    loading: &'static str,
    error: &'static str,
}

/// Everything the page printed, in order.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    lines: Arc<Mutex<Vec<String>>>,
}

impl Transcript {
    fn push(&self, name: &str, lines: Vec<String>) {
        for line in lines {
            println!("   [{name}] {line}");
            self.lines.lock().push(format!("[{name}] {line}"));
        }
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().iter().any(|line| line.contains(needle))
    }
}

pub struct DeferrablePage {
    controller: DeferController,
    owner: Owner,
    transcript: Transcript,
    options: DemoOptions,
    chart: DeferredFragment<ChartData>,
    table: DeferredFragment<DataTable>,
    map: DeferredFragment<MapWidget>,
    weather: DeferredFragment<WeatherWidget>,
    prefetch: DeferredFragment<ChartData>,
}

impl DeferrablePage {
    /// Register every fragment and mount its renderer. Needs a tokio runtime.
    pub fn mount(options: DemoOptions, config: DeferConfig) -> Result<Self, DeferError> {
        let controller = DeferController::new(config)?;
        let owner = Owner::new("deferrable-page");
        let transcript = Transcript::default();

        let chart = controller.register("chart", Trigger::Viewport, loader(&options, "chart", ChartData::monthly));
        let table = controller.register(
            "data-table",
            Trigger::Interaction(TABLE_BUTTON.into()),
            loader(&options, "data-table", DataTable::sample),
        );
        let map = controller.register(
            "map",
            Trigger::Hover(MAP_CONTAINER.into()),
            loader(&options, "map", MapWidget::default),
        );
        let weather = controller.register(
            "weather",
            Trigger::Timer(options.timer),
            loader(&options, "weather", WeatherWidget::default),
        );
        let prefetch = controller.register(
            "prefetch",
            Trigger::IdlePrefetch,
            loader(&options, "prefetch", ChartData::quarterly),
        );

        let page = Self {
            controller,
            owner,
            transcript,
            options,
            chart,
            table,
            map,
            weather,
            prefetch,
        };

        page.show(&page.chart, Texts {
            placeholder: "Chart will appear here when scrolled into view",
            loading: "Loading chart...",
            error: "Failed to load chart",
        });
        page.show(&page.table, Texts {
            placeholder: "[Show Data Table]",
            loading: "Loading data table...",
            error: "Failed to load data table",
        });
        page.show(&page.map, Texts {
            placeholder: "Hover over this area to load the map",
            loading: "Loading map...",
            error: "Failed to load map",
        });
        page.show(&page.weather, Texts {
            placeholder: "Weather loads after a short wait",
            loading: "Loading weather widget...",
            error: "Failed to load weather widget",
        });
        page.show(&page.prefetch, Texts {
            placeholder: "Quarterly chart loads while you are idle",
            loading: "Loading content...",
            error: "Failed to load prefetched content",
        });

        Ok(page)
    }

    /// Render `fragment` from an effect owned by the page.
    fn show<P>(&self, fragment: &DeferredFragment<P>, texts: Texts)
    where
        P: Widget + Send + Sync + 'static,
    {
        fragment.tie_to(&self.owner);

        let view = fragment.clone();
        let transcript = self.transcript.clone();
        self.owner.effect(move || {
            let lines = match view.state() {
                FragmentState::Placeholder => vec![texts.placeholder.to_string()],
                FragmentState::Loading => vec![texts.loading.to_string()],
                FragmentState::Ready => view.payload().map(|widget| widget.render()).unwrap_or_default(),
                FragmentState::Error => vec![texts.error.to_string()],
            };
            transcript.push(view.name(), lines);
        });
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Final state of every fragment, in registration order.
    pub fn states(&self) -> Vec<(String, FragmentState)> {
        [
            self.chart.id(),
            self.table.id(),
            self.map.id(),
            self.weather.id(),
            self.prefetch.id(),
        ]
        .into_iter()
        .zip(FRAGMENT_NAMES)
        .filter_map(|(id, name)| self.controller.state(id).map(|state| (name.to_string(), state)))
        .collect()
    }

    async fn host(&self, step: &str, event: HostEvent) {
        println!("-- host: {step}");
        let fired = self.controller.dispatch(event);
        flush_effects();
        tracing::info!(step, fired, "host event");
        tokio::time::sleep(self.options.latency).await;
    }

    /// Play the scripted session to the end.
    pub async fn play(&self) {
        self.host("browser idle", HostEvent::Idle).await;
        self.host("chart scrolled into view", HostEvent::EnteredViewport(self.chart.id()))
            .await;
        self.host("clicked Show Data Table", HostEvent::Interaction(TABLE_BUTTON.into()))
            .await;
        self.host("pointer over the map", HostEvent::PointerEnter(MAP_CONTAINER.into()))
            .await;

        println!("-- host: waiting {}ms for the weather timer", self.options.timer.as_millis());
        for name in FRAGMENT_NAMES {
            self.settled(name).await;
        }
    }

    /// Wait until the named fragment is `Ready` or `Error`.
    async fn settled(&self, name: &str) {
        let mut tick = tokio::time::interval(POLL);
        loop {
            // Under manual scheduling nothing renders unless the host flushes.
            flush_effects();
            let done = self
                .states()
                .into_iter()
                .find(|(fragment, _)| fragment == name)
                .map_or(true, |(_, state)| state.is_terminal());
            if done {
                return;
            }
            tick.tick().await;
        }
    }

    pub fn unmount(&self) {
        self.owner.dispose();
    }
}

type Load<P> = BoxFuture<'static, Result<P, LoadError>>;

/// A loader that takes `latency` and then yields `payload()`, or fails if
/// `name` is the fragment picked to fail.
fn loader<P, F>(options: &DemoOptions, name: &'static str, payload: F) -> impl FnOnce() -> Load<P> + Send + 'static
where
    P: Send + 'static,
    F: FnOnce() -> P + Send + 'static,
{
    let latency = options.latency;
    let fail = options.fail.as_deref() == Some(name);

    move || {
        async move {
            tokio::time::sleep(latency).await;
            if fail {
                return Err(LoadError::failed(format!("{name} bundle unavailable")));
            }
            tracing::info!(fragment = name, "component loaded");
            Ok(payload())
        }
        .boxed()
    }
}

/// Mount the page, play the session and print the outcome.
pub async fn run(options: DemoOptions, config: DeferConfig) -> Result<Vec<(String, FragmentState)>, DeferError> {
    let page = DeferrablePage::mount(options, config)?;
    crate::signals_demo::print_block("deferrable page", &[]);
    page.play().await;

    let states = page.states();
    let summary: Vec<String> = states.iter().map(|(name, state)| format!("{name}: {state}")).collect();
    crate::signals_demo::print_block("final states", &summary);

    page.unmount();
    Ok(states)
}
