//! Completion certificate: a one-page landscape A4 PDF.

use std::fmt::Write as _;

/// A4 landscape in PDF points.
const PAGE_WIDTH: f32 = 842.0;
const PAGE_HEIGHT: f32 = 595.0;
const MM: f32 = 72.0 / 25.4;

/// Rendered certificate ready to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Certificate {
    #[must_use]
    pub fn for_student(name: &str) -> Self {
        Self {
            file_name: certificate_file_name(name),
            bytes: render_certificate(name),
        }
    }
}

/// `Master_Certificate_<Name>.pdf`, with whitespace runs collapsed to `_` and
/// path separators removed.
#[must_use]
pub fn certificate_file_name(name: &str) -> String {
    let cleaned: String = name.chars().filter(|c| !matches!(c, '/' | '\\')).collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    let stem = if joined.is_empty() { "Student" } else { joined.as_str() };
    format!("Master_Certificate_{stem}.pdf")
}

struct Line<'a> {
    text: &'a str,
    size: f32,
    /// Baseline distance from the top edge, in millimetres.
    top_mm: f32,
    rgb: (u8, u8, u8),
}

/// Render the certificate for `name` as PDF 1.4 bytes.
#[must_use]
pub fn render_certificate(name: &str) -> Vec<u8> {
    let upper = name.to_uppercase();
    let lines = [
        Line {
            text: "MASTER'S DEGREE",
            size: 40.0,
            top_mm: 50.0,
            rgb: (248, 250, 252),
        },
        Line {
            text: "In Artificial Intelligence",
            size: 20.0,
            top_mm: 65.0,
            rgb: (248, 250, 252),
        },
        Line {
            text: "This is to certify that",
            size: 16.0,
            top_mm: 85.0,
            rgb: (248, 250, 252),
        },
        Line {
            text: &upper,
            size: 32.0,
            top_mm: 105.0,
            rgb: (129, 140, 248),
        },
        Line {
            text: "has completed every block and passed the final master exam",
            size: 14.0,
            top_mm: 125.0,
            rgb: (203, 213, 225),
        },
    ];

    let content = page_content(&lines);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {PAGE_WIDTH} {PAGE_HEIGHT}] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{content}\nendstream",
            content.len()
        ),
    ];

    let mut pdf: Vec<u8> = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{body}\nendobj\n", index + 1).as_bytes());
    }

    let xref_at = pdf.len();
    let mut trailer = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = write!(trailer, "{offset:010} 00000 n \n");
    }
    let _ = write!(
        trailer,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref_at}\n%%EOF\n",
        objects.len() + 1
    );
    pdf.extend_from_slice(trailer.as_bytes());
    pdf
}

fn page_content(lines: &[Line<'_>]) -> String {
    let inset = 10.0 * MM;
    let mut out = String::new();
    // Background and border.
    let _ = writeln!(
        out,
        "{} rg 0 0 {PAGE_WIDTH} {PAGE_HEIGHT} re f",
        color(15, 23, 42)
    );
    let _ = writeln!(
        out,
        "{} RG {:.2} w {inset:.2} {inset:.2} {:.2} {:.2} re S",
        color(79, 70, 229),
        2.0 * MM,
        PAGE_WIDTH - 2.0 * inset,
        PAGE_HEIGHT - 2.0 * inset
    );

    for line in lines {
        let (r, g, b) = line.rgb;
        let encoded = encode_text(line.text);
        let width = text_width(&encoded, line.size);
        let x = (PAGE_WIDTH - width) / 2.0;
        let y = PAGE_HEIGHT - line.top_mm * MM;
        let _ = writeln!(
            out,
            "BT /F1 {} Tf {} rg {x:.2} {y:.2} Td ({}) Tj ET",
            line.size,
            color(r, g, b),
            escape(&encoded)
        );
    }
    out.trim_end().to_string()
}

fn color(r: u8, g: u8, b: u8) -> String {
    format!(
        "{:.3} {:.3} {:.3}",
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0
    )
}

/// Map text to WinAnsi bytes; characters outside Latin-1 become `?`.
fn encode_text(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match u32::from(c) {
            code @ (0x20..=0x7e | 0xa0..=0xff) => u8::try_from(code).unwrap_or(b'?'),
            _ => b'?',
        })
        .collect()
}

fn escape(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &byte in bytes {
        match byte {
            b'(' | b')' | b'\\' => {
                out.push('\\');
                out.push(char::from(byte));
            }
            0x20..=0x7e => out.push(char::from(byte)),
            _ => {
                let _ = write!(out, "\\{byte:03o}");
            }
        }
    }
    out
}

fn text_width(bytes: &[u8], size: f32) -> f32 {
    let units: u32 = bytes.iter().map(|byte| glyph_width(*byte)).sum();
    // Font units are thousandths of the font size.
    #[allow(clippy::cast_precision_loss)]
    let units = units as f32;
    units * size / 1000.0
}

/// Helvetica-Bold advance widths for printable ASCII; other bytes use an average.
fn glyph_width(byte: u8) -> u32 {
    const ASCII: [u16; 95] = [
        278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
        556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // '0'..'?'
        975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // '@'..'O'
        667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 'P'..'_'
        333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // '`'..'o'
        611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 'p'..'~'
    ];
    match byte {
        0x20..=0x7e => u32::from(ASCII[usize::from(byte - 0x20)]),
        _ => 611,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_name_collapses_whitespace_and_strips_separators() {
        assert_eq!(
            certificate_file_name("Ada   King Lovelace"),
            "Master_Certificate_Ada_King_Lovelace.pdf"
        );
        assert_eq!(
            certificate_file_name("../etc/pass wd"),
            "Master_Certificate_..etcpass_wd.pdf"
        );
        assert_eq!(certificate_file_name(" / "), "Master_Certificate_Student.pdf");
    }

    #[test]
    fn renders_a_single_page_pdf_with_uppercased_name() {
        let bytes = render_certificate("Grace (Amazing) Hopper");
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.starts_with("%PDF-1.4\n"));
        assert!(text.ends_with("%%EOF\n"));
        assert!(text.contains("/Count 1"));
        assert!(text.contains("/MediaBox [0 0 842 595]"));
        assert!(text.contains("(GRACE \\(AMAZING\\) HOPPER) Tj"));
    }

    #[test]
    fn xref_offsets_point_at_objects() {
        let bytes = render_certificate("Alan Turing");
        let text = String::from_utf8_lossy(&bytes).into_owned();
        let xref = text.find("xref\n").unwrap();
        let entries: Vec<usize> = text[xref..]
            .lines()
            .skip(3)
            .take(5)
            .map(|line| line[..10].parse().unwrap())
            .collect();
        for (index, offset) in entries.iter().enumerate() {
            assert!(text[*offset..].starts_with(&format!("{} 0 obj", index + 1)));
        }
        let startxref: usize = text
            .lines()
            .skip_while(|line| *line != "startxref")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(startxref, xref);
    }

    #[test]
    fn non_latin_text_is_replaced() {
        assert_eq!(encode_text("Zoë 李"), b"Zo\xeb ?".to_vec());
        assert_eq!(escape(b"Zo\xeb"), "Zo\\353");
    }
}
