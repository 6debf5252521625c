//! Domain model shared by the engine, the ledger and the server.
//!
//! - [`Question`]: immutable incoming question
//! - [`Route`]: knowledge base, web search or hybrid
//! - [`Solution`]: structured step-by-step answer
//! - [`Response`]: everything returned for an accepted question
//! - [`Feedback`] / [`FeedbackRecord`]: ledger entries

mod feedback;
mod question;
mod response;
mod route;
mod solution;

pub use feedback::{Feedback, FeedbackAck, FeedbackRecord, ResponseEntry, MAX_RATING, MIN_RATING};
pub use question::{Difficulty, Question, Topic};
pub use response::{generate_response_id, RecoveredCondition, Response};
pub use route::Route;
pub use solution::{format_steps, Solution, SolutionStatus, DEGRADED_EXPLANATION};
