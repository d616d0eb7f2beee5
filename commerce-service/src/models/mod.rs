//! Domain models for commerce-service.

mod document;
mod line_item;
mod product;
mod tax_rate;

pub use document::{
    CreateDocument, Document, DocumentKind, DocumentStatus, ListDocumentsFilter,
    TransitionDocument, UpdateDocument,
};
pub use line_item::{AttachLineItem, DiscountType, LineItem, UpdateLineItem};
pub use product::{CreateProduct, Product};
pub use tax_rate::{CreateTaxRate, TaxRate};
