//! Document export boundary
//!
//! Finalized bills and payments are handed to an exporter that produces a
//! binary document. The core never inspects the output.

use crate::domain::bill::Bill;
use crate::domain::customer::Customer;
use crate::domain::payment::PaymentReceipt;
use crate::domain::shared::Result;

pub trait DocumentExporter: Send + Sync {
    /// MIME type of the produced documents
    fn content_type(&self) -> &'static str;

    fn render_bill(&self, bill: &Bill, customer: &Customer) -> Result<Vec<u8>>;

    fn render_receipt(&self, receipt: &PaymentReceipt, customer: &Customer) -> Result<Vec<u8>>;
}

/// Renders printable HTML documents
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlDocumentExporter;

impl DocumentExporter for HtmlDocumentExporter {
    fn content_type(&self) -> &'static str {
        "text/html; charset=utf-8"
    }

    fn render_bill(&self, bill: &Bill, customer: &Customer) -> Result<Vec<u8>> {
        let rows = [
            ("Customer ID", customer.id.to_string()),
            ("Customer Name", customer.customer_name.clone()),
            ("Email", customer.email.clone()),
            ("Connection Type", customer.connection_type.to_string()),
            ("Bill No", bill.id.to_string()),
            ("Date", bill.date.format("%Y-%m-%d").to_string()),
            ("Units", bill.units.to_string()),
            ("Amount", format!("{:.2}", bill.amount)),
            ("Status", bill.status.to_string()),
        ];
        Ok(page("Electricity Bill", &rows).into_bytes())
    }

    fn render_receipt(&self, receipt: &PaymentReceipt, customer: &Customer) -> Result<Vec<u8>> {
        let payment = &receipt.payment;
        let rows = [
            ("Receipt No", payment.id.to_string()),
            ("Customer ID", customer.id.to_string()),
            ("Customer Name", receipt.customer_name.clone()),
            ("Bill No", payment.bill_id.to_string()),
            ("Units", receipt.units.to_string()),
            ("Amount Paid", format!("{:.2}", payment.amount)),
            ("Method", payment.method.to_string()),
            ("Paid At", payment.created_at.format("%Y-%m-%d %H:%M UTC").to_string()),
        ];
        Ok(page("Payment Receipt", &rows).into_bytes())
    }
}

fn page(title: &str, rows: &[(&str, String)]) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head><meta charset=\"UTF-8\">");
    html.push_str(&format!("<title>{}</title></head>\n<body>\n", escape_html(title)));
    html.push_str(&format!("<h1>{}</h1>\n<table class=\"table table-bordered\">\n", escape_html(title)));
    for (label, value) in rows {
        html.push_str(&format!(
            "<tr><th>{}</th><td>{}</td></tr>\n",
            escape_html(label),
            escape_html(value)
        ));
    }
    html.push_str("</table>\n</body>\n</html>\n");
    html
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::customer::NewCustomer;
    use crate::domain::tariff::TariffTable;
    use chrono::Utc;

    #[test]
    fn test_render_bill_escapes_fields() {
        let customer = Customer::register(
            NewCustomer::new("Tom <script>", "tom@example.com"),
            Utc::now(),
        )
        .unwrap();
        let bill = Bill::issue(&customer, 12, &TariffTable::default(), Utc::now());

        let html = String::from_utf8(HtmlDocumentExporter.render_bill(&bill, &customer).unwrap()).unwrap();
        assert!(html.contains("Tom &lt;script&gt;"));
        assert!(html.contains("<td>96.00</td>"));
        assert!(html.contains(&bill.id.to_string()));
    }
}
