//! PDF rendering for purchase receipts and delivered-order summaries.
//!
//! Plain text layout on A4 with the built-in Helvetica faces; no shipped
//! font files. Output is a byte buffer the callers either stream, mail as
//! an attachment, or persist to the export directory.

use chrono::{DateTime, Utc};
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference};
use rust_decimal::Decimal;

use crate::error::AppResult;
use crate::models::LineSnapshot;

const PAGE_WIDTH: f32 = 210.0;
const PAGE_HEIGHT: f32 = 297.0;
const MARGIN_LEFT: f32 = 20.0;
const MARGIN_TOP: f32 = 277.0;
const MARGIN_BOTTOM: f32 = 20.0;

/// Everything a single receipt shows.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub orden_id: i32,
    pub customer: String,
    pub date: DateTime<Utc>,
    pub total: Decimal,
    pub items: Vec<LineSnapshot>,
}

/// Cursor-based writer over a growing A4 document.
struct Page {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    y: f32,
}

impl Page {
    fn new(title: &str) -> AppResult<Self> {
        let (doc, page, layer) =
            PdfDocument::new(title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "contenido");
        let regular = doc.add_builtin_font(BuiltinFont::Helvetica)?;
        let bold = doc.add_builtin_font(BuiltinFont::HelveticaBold)?;
        let layer = doc.get_page(page).get_layer(layer);
        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            y: MARGIN_TOP,
        })
    }

    fn break_page_if_needed(&mut self, needed: f32) {
        if self.y - needed < MARGIN_BOTTOM {
            let (page, layer) = self
                .doc
                .add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "contenido");
            self.layer = self.doc.get_page(page).get_layer(layer);
            self.y = MARGIN_TOP;
        }
    }

    fn heading(&mut self, text: &str) {
        self.break_page_if_needed(12.0);
        // Rough centering for the fixed-width titles used here.
        let x = (PAGE_WIDTH - text.len() as f32 * 3.2) / 2.0;
        self.layer
            .use_text(text, 18.0, Mm(x.max(MARGIN_LEFT)), Mm(self.y), &self.bold);
        self.y -= 12.0;
    }

    fn line(&mut self, text: String) {
        self.break_page_if_needed(6.0);
        self.layer
            .use_text(text, 12.0, Mm(MARGIN_LEFT), Mm(self.y), &self.regular);
        self.y -= 6.0;
    }

    fn line_right(&mut self, text: String) {
        self.break_page_if_needed(6.0);
        let x = PAGE_WIDTH - MARGIN_LEFT - text.len() as f32 * 2.2;
        self.layer
            .use_text(text, 12.0, Mm(x.max(MARGIN_LEFT)), Mm(self.y), &self.regular);
        self.y -= 6.0;
    }

    fn blank(&mut self) {
        self.y -= 6.0;
    }

    fn into_bytes(self) -> AppResult<Vec<u8>> {
        Ok(self.doc.save_to_bytes()?)
    }
}

fn write_order_block(page: &mut Page, receipt: &Receipt) {
    page.line(format!("Pedido: #{}", receipt.orden_id));
    page.line(format!("Cliente: {}", receipt.customer));
    page.line(format!(
        "Fecha: {}",
        receipt.date.format("%d/%m/%Y %H:%M")
    ));
    page.blank();
    page.line("Productos:".to_string());
    for item in &receipt.items {
        page.line(format!(
            "- {} x{} – ${:.2}",
            item.product, item.quantity, item.price
        ));
    }
    page.blank();
}

/// Render one purchase receipt.
pub fn render_receipt(receipt: &Receipt) -> AppResult<Vec<u8>> {
    let mut page = Page::new(&format!("Comprobante-{}", receipt.orden_id))?;
    page.heading("Comprobante de Compra");
    write_order_block(&mut page, receipt);
    page.line_right(format!("Total: ${:.2}", receipt.total));
    page.into_bytes()
}

/// Render the multi-order delivered summary used by the export endpoint.
pub fn render_summary(receipts: &[Receipt]) -> AppResult<Vec<u8>> {
    let mut page = Page::new("Resumen de Pedidos Entregados")?;
    page.heading("Resumen de Pedidos Entregados");
    for receipt in receipts {
        page.line(format!("Orden ID: {}", receipt.orden_id));
        page.line(format!("Cliente: {}", receipt.customer));
        page.line(format!("Fecha: {}", receipt.date.format("%d/%m/%Y %H:%M")));
        page.line(format!("Total: ${:.2}", receipt.total));
        for item in &receipt.items {
            page.line(format!(
                " - {} x{} – ${:.2}",
                item.product, item.quantity, item.price
            ));
        }
        page.blank();
    }
    page.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample() -> Receipt {
        Receipt {
            orden_id: 7,
            customer: "Ana Flores".to_string(),
            date: Utc::now(),
            total: dec!(40.00),
            items: vec![
                LineSnapshot {
                    product: "Rose Bouquet".to_string(),
                    quantity: 2,
                    price: dec!(20.00),
                },
            ],
        }
    }

    #[test]
    fn receipt_renders_nonempty_pdf() {
        let bytes = render_receipt(&sample()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert!(bytes.len() > 500);
    }

    #[test]
    fn summary_renders_across_many_orders() {
        // Enough blocks to force page breaks.
        let receipts: Vec<Receipt> = (0..60)
            .map(|i| {
                let mut r = sample();
                r.orden_id = i;
                r
            })
            .collect();
        let bytes = render_summary(&receipts).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn empty_summary_still_renders() {
        let bytes = render_summary(&[]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }
}
