//! Document output.
//!
//! # Submodules
//!
//! - [`docx`]: Renders report text into a Word document, one file per scope
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── local_news.docx
//! ├── ...
//! └── 2025-05-06/          # with --dated
//!     └── openai/
//!         ├── local_news.docx
//!         └── ...
//! ```

pub mod docx;
