//! HTML fixtures shaped like the camera.it commission archive.

#![allow(dead_code)]

use camera_pdfs::Period;

/// Index page: one `data-anno` block per year, with enabled months linked
/// and the remaining months rendered disabled.
pub fn index_page(available: &[Period]) -> String {
    let mut years: Vec<i32> = available.iter().map(|p| p.year).collect();
    years.sort_unstable();
    years.dedup();

    let mut html = String::from("<html><body><div class=\"calendario\">");
    for year in years {
        html.push_str(&format!("<div class=\"anno\" data-anno=\"{year}\"><h3>{year}</h3>"));
        for month in 1..=12u8 {
            let period = Period::new(year, month);
            if available.contains(&period) {
                html.push_str(&format!(
                    "<a class=\"mese\" data-mese=\"{month}\" href=\"/leg19/210?commissione=21&amp;annomese={}&amp;view=f\">{month}</a>",
                    period.annomese()
                ));
            } else {
                html.push_str(&format!(
                    "<span class=\"mese disabled\" data-mese=\"{month}\">{month}</span>"
                ));
            }
        }
        html.push_str("</div>");
    }
    html.push_str("</div></body></html>");
    html
}

/// Month page listing `hrefs` as "Scarica PDF" links, plus one unrelated link.
pub fn month_page(hrefs: &[String]) -> String {
    let mut html = String::from("<html><body><ul class=\"resoconti\">");
    for (i, href) in hrefs.iter().enumerate() {
        html.push_str(&format!(
            "<li>Seduta n. {} - <a href=\"{href}\">Scarica PDF</a></li>",
            i + 1
        ));
    }
    html.push_str("<li><a href=\"/leg19/files/informativa.pdf\">Informativa privacy</a></li>");
    html.push_str("</ul></body></html>");
    html
}

/// Bulletin file path for a given day, in the site's naming scheme.
pub fn bulletin_path(year: i32, month: u8, day: u8, number: u32) -> String {
    format!(
        "/leg19/resoconti/commissioni/bollettini/pdf/{year}/{month:02}/{day:02}/leg.19.bol{number:04}.data{year}{month:02}{day:02}.com21.pdf"
    )
}

/// Transcript file path for a given day, in the site's naming scheme.
pub fn transcript_path(year: i32, month: u8, day: u8, sitting: u32) -> String {
    format!(
        "/leg19/resoconti/commissioni/stenografici/pdf/21/audiz2/audizione/{year}/{month:02}/{day:02}/leg.19.stencomm.data{year}{month:02}{day:02}.U1.com21.audiz2.audizione.{sitting:04}.pdf"
    )
}
