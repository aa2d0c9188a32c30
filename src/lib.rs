pub mod collection;
pub mod config;
pub mod error;
pub mod handicap;
pub mod improbable;
pub mod likelihood;
pub mod logging;
pub mod normal;
pub mod optimizer;
pub mod pipeline;
pub mod rank;
pub mod report;
pub mod seeding;
pub mod spline;
pub mod store;
pub mod td_list;
pub mod uncertainty;
