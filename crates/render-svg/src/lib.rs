//! SVG output.
//!
//! [`SvgDevice`] builds an [`XmlNode`] tree while drawing and serializes it with
//! quick-xml once the definitions it references are known.

mod device;
pub mod fonts;
pub mod node;
pub mod resources;

pub use device::{SvgDevice, SvgOptions};
pub use fonts::FontRegistry;
pub use node::XmlNode;
pub use resources::{ClipKey, EmbeddedImage, PatternKey, ResourceTable};
