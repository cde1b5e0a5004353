//! Deferred Fragments
//!
//! A deferred fragment is a unit of content whose loading waits for a
//! trigger: the fragment scrolling into view, a click, a hover, a timer, or
//! the host going idle.
//!
//! # Lifecycle
//!
//! Every fragment starts as `Placeholder`. The first host event that
//! satisfies its trigger moves it to `Loading` and starts its loader on the
//! tokio runtime. The loader's outcome moves it to `Ready` or `Error`, and
//! there it stays.
//!
//! The state is held in a [`Signal`](crate::reactive::Signal), so the host
//! renders fragments from ordinary effects:
//!
//! ```rust,no_run
//! use trellis_core::config::DeferConfig;
//! use trellis_core::defer::{DeferController, HostEvent, Trigger};
//! use trellis_core::error::LoadError;
//! use trellis_core::reactive::Effect;
//!
//! # async fn demo() -> Result<(), trellis_core::error::DeferError> {
//! let controller = DeferController::new(DeferConfig::default())?;
//! let table = controller.register("table", Trigger::Interaction("load".into()), || async {
//!     Ok::<_, LoadError>(vec![100, 200, 300])
//! });
//!
//! let view = table.clone();
//! let _render = Effect::new(move || println!("table is {}", view.state()));
//!
//! controller.dispatch(HostEvent::Interaction("load".into()));
//! # Ok(())
//! # }
//! ```

mod controller;
mod fragment;
mod state;
mod trigger;

pub use controller::DeferController;
pub use fragment::DeferredFragment;
pub use state::{advance, FragmentEvent, FragmentState};
pub use trigger::{ElementRef, FragmentId, HostEvent, Trigger};
