pub mod draw;

pub use draw::{render_views, DrawOpts};
