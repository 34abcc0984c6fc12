pub mod alerts;
pub mod pipeline;
pub mod recommend;
