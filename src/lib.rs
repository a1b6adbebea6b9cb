pub mod controller;
pub mod domain;
pub mod fetch;
pub mod inputter;
pub mod model;
pub mod navigation;
pub mod pipeline;
pub mod source;
pub mod state;
pub mod ui;
