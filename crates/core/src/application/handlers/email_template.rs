// Email content for reminder and document-delivery messages

use crate::domain::{InvoiceSnapshot, Recipient};
use crate::port::{EmailMessage, RenderedDocument};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// `1234.5` -> `$1,234.50`
pub fn format_usd(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let dollars = (cents / 100).to_string();
    let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
    for (i, digit) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

pub fn reminder_email(recipient: &Recipient, invoice: &InvoiceSnapshot) -> EmailMessage {
    let number = invoice.display_number();
    let due = invoice.due_date.format(DATE_FORMAT).to_string();
    let amount = format_usd(invoice.total_amount);
    let name = if recipient.name.trim().is_empty() {
        invoice.client_name.as_str()
    } else {
        recipient.name.as_str()
    };

    let text = format!(
        "Dear {name},\n\n\
         Your invoice {number} is due on {due}.\n\n\
         Invoice Number: {number}\n\
         Due Date: {due}\n\
         Amount Due: {amount}\n\n\
         Please arrange payment by the due date to avoid late fees. \
         If you have already paid, you can ignore this message.\n\n\
         Thank you for your business."
    );

    let html = format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Payment Reminder</title></head>\n\
         <body style=\"font-family: Arial, sans-serif; color: #333;\">\n\
         <h2>Payment Reminder</h2>\n\
         <p>Dear {name},</p>\n\
         <p>Your invoice <strong>{number}</strong> is due on <strong>{due}</strong>.</p>\n\
         <ul>\n\
         <li><strong>Invoice Number:</strong> {number}</li>\n\
         <li><strong>Due Date:</strong> {due}</li>\n\
         <li><strong>Amount Due:</strong> {amount}</li>\n\
         </ul>\n\
         <p>Please arrange payment by the due date to avoid late fees. \
         If you have already paid, you can ignore this message.</p>\n\
         <p>Thank you for your business.</p>\n\
         </body>\n</html>",
        name = escape_html(name),
        number = escape_html(&number),
    );

    EmailMessage {
        to: recipient.email.clone(),
        subject: format!("Payment Reminder: Invoice {} Due {}", number, due),
        text: Some(text),
        html: Some(html),
    }
}

pub fn document_ready_email(
    to: &str,
    invoice: &InvoiceSnapshot,
    document: &RenderedDocument,
    download_url: Option<&str>,
) -> EmailMessage {
    let number = invoice.display_number();
    let location = download_url.unwrap_or(document.path.as_str());
    EmailMessage {
        to: to.to_string(),
        subject: format!("Invoice {} is ready", number),
        text: Some(format!(
            "Dear {},\n\nInvoice {} for {} is ready: {}\n",
            invoice.client_name,
            number,
            format_usd(invoice.total_amount),
            location
        )),
        html: None,
    }
}

fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
