//! turnloop: streaming tool-call orchestration for chat clients.
//!
//! A turn streams a model response to the client while reassembling the tool
//! calls it carries, repairs arguments cut off mid-stream, executes the calls
//! against in-process or external tool servers, persists the results into the
//! transcript, and re-invokes the model until it answers without tools.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use turnloop::prelude::*;
//!
//! # async fn example() -> turnloop::error::Result<()> {
//! let config = EngineConfig::load()?;
//! let backend = Arc::new(BackendRouter::from_config(&config));
//! let store = Arc::new(MemoryStore::new());
//! let session = store
//!     .create_session("demo", ModelRef::new("openai", "gpt-4o-mini"), Default::default())
//!     .await?;
//!
//! let controller = ContinuationController::new(
//!     backend,
//!     ToolDispatcher::internal_only(InternalToolRegistry::new()),
//!     store,
//! )
//! .with_settings(config.loop_settings());
//!
//! let (sink, _client) = ChunkSink::channel();
//! let request = TurnRequest::builder()
//!     .session_id(session.id)
//!     .user_message("Hello!")
//!     .build();
//! let outcome = controller.run_turn(request, sink).await?;
//! println!("{:?}", outcome.status);
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod persist;
pub mod prelude;
pub mod store;
pub mod stream;
pub mod tools;
pub mod types;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
