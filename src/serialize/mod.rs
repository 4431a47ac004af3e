//! C6: zero-copy, template-driven XML serialization of worksheet data.

pub mod templates;
pub mod worksheet;
pub mod xml_writer;

pub use templates::{format_number, SHARED_STRING_MIN_LEN};
pub use worksheet::{estimate_worksheet_size, write_sheet_data, write_shared_strings, SerializerOptions};
pub use xml_writer::XmlWriter;
