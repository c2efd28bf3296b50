//! # Renderer
//!
//! Per-recipient message rendering.
//!
//! Templates use `{{ field }}` placeholders. A field is resolved against, in
//! order: the recipient built-ins (`name`, `email`, `first_name`), the
//! recipient attributes, the campaign built-ins (`from`, `subject`,
//! `cta_text`, `cta_link`) and the campaign variables.
//!
//! ```ignore
//! use renderer::TemplateRenderer;
//! use contracts::MessageRenderer;
//!
//! let renderer = TemplateRenderer::new(&campaign)?;
//! let message = renderer.render(&campaign, &recipient)?;
//! ```

mod context;
mod engine;
mod template;

pub use engine::TemplateRenderer;
pub use template::{escape_html, Escape, Template};
