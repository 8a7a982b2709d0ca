//! # storyflow-core - Deterministic Story-Flow Runtime
//!
//! **A cursor over an authored story graph.** Load a project (see
//! [`storyflow_model`]), point the [`Runtime`] at a flow, and step through
//! it: every call to [`Runtime::next_node`] advances the cursor to the next
//! node worth presenting, resolving conditions, jumps, random branches,
//! sequences, and sub-flow calls along the way.
//!
//! ## Core Concepts
//!
//! ### 1. The walker
//!
//! Nodes are typed; the type decides which outgoing edge a step follows.
//! Text and Choice nodes are **emitting** - the walker stops on them and
//! hands control back to the host. Everything else (conditions, variable
//! writes, random switches, sequences, jumps, sub-flow calls) is
//! **internal** and is passed through within the same step, bounded by a
//! depth cap.
//!
//! ### 2. Text templating
//!
//! Element text is a small template language:
//!
//! - `[[LIST a|b|c]]` (and `LOOP` / `RND` / `SRND`) rotating variations
//! - `[IF $x == 1 ? "one" : "other"]` inline conditionals
//! - `{$gold}` / `{%seen = true}` expression interpolation
//! - `[TODO ...]` author notes (stripped), `[-]` one-shot and `[+]`
//!   fallback markers
//!
//! Expressions run in a sandboxed evaluator over two flat variable stores
//! (`$global`, `%local`); authoring mistakes render as `--error--` markers
//! instead of failing the step.
//!
//! ### 3. Localization
//!
//! Rendering asks for the runtime's locale and falls back to the project's
//! main locale when a translation is missing or empty; fallback content is
//! flagged `not_translated`.
//!
//! ### 4. Determinism
//!
//! All randomness (Random nodes, `RND`/`SRND` variations, random cycle
//! policies) flows through one injectable PRNG - seed it with
//! [`Runtime::with_seed`] and a story replays identically.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use storyflow_core::{NextOutcome, Runtime};
//!
//! let bytes = std::fs::read("project.json").unwrap();
//! let mut runtime = Runtime::from_json(&bytes, None).unwrap();
//!
//! loop {
//!     match runtime.next_node(None) {
//!         Ok(NextOutcome::Node(_)) => {
//!             if let Some(line) = runtime.get_parsed_text(None, false) {
//!                 println!("{}", line.text);
//!             }
//!         }
//!         Ok(NextOutcome::End) => break,
//!         Err(err) => {
//!             eprintln!("story stopped: {err}");
//!             break;
//!         }
//!     }
//! }
//! ```

pub mod error;
pub mod eval;
pub mod locale;
pub mod runtime;
pub mod selector;
pub mod state;
pub mod template;
pub mod value;
pub mod variation;
pub mod walker;

pub use error::{EvalError, FlowError, Result};
pub use locale::ResolvedText;
pub use runtime::Runtime;
pub use state::{ElementState, SubFlowFrame};
pub use template::{RenderedText, ERROR_MARKER, ERROR_MARKER_INLINE};
pub use value::{Scope, Value, VariableStore};
pub use variation::{Variation, VariationKind, VariationRegistry};
pub use walker::{NextOutcome, MAX_WALK_DEPTH, THE_END};

// The model crate is re-exported so hosts need only one dependency
pub use storyflow_model as model;
