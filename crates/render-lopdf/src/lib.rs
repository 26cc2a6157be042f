//! PDF output built on lopdf.
//!
//! The page is assembled in memory as a list of content operations and written
//! through [`StreamingPdfWriter`], which sends each object to its sink as soon as
//! it exists and closes with the page tree, catalog and cross-reference table.

mod device;
pub mod shading;
mod writer;

pub use device::{PdfDevice, PdfOptions};
pub use shading::ShadingMesh;
pub use writer::StreamingPdfWriter;
