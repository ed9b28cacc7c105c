use crate::types::ShapePayload;
use geo::MultiPolygon;
use std::fmt::Write;

/// The drawing surface the renderer emits into. One shape per region datum,
/// one rect per legend swatch; `clear` drops everything previously drawn so
/// a redraw never duplicates elements.
pub trait Surface {
    fn clear(&mut self);
    fn region(&mut self, geometry: &MultiPolygon<f64>, fill: &str, payload: &ShapePayload);
    fn legend_swatch(&mut self, x: f64, y: f64, size: f64, fill: &str, bounds: (f64, f64));
    fn message(&mut self, text: &str);
}

/// Renders the draw-command stream into a standalone SVG document. Each
/// region path carries the payload as `data-*` attributes and a `<title>`,
/// the attachment points for browser-side hover bindings.
pub struct SvgSurface {
    width: u32,
    height: u32,
    regions: String,
    legend: String,
    messages: String,
}

impl SvgSurface {
    pub fn new(width: u32, height: u32) -> Self {
        SvgSurface {
            width,
            height,
            regions: String::new(),
            legend: String::new(),
            messages: String::new(),
        }
    }

    /// The assembled document.
    pub fn finish(&self) -> String {
        let mut doc = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\">\n",
            w = self.width,
            h = self.height,
        );
        if !self.regions.is_empty() {
            doc.push_str("<g class=\"counties\">\n");
            doc.push_str(&self.regions);
            doc.push_str("</g>\n");
        }
        if !self.legend.is_empty() {
            doc.push_str("<g id=\"legend\">\n");
            doc.push_str(&self.legend);
            doc.push_str("</g>\n");
        }
        doc.push_str(&self.messages);
        doc.push_str("</svg>\n");
        doc
    }
}

impl Surface for SvgSurface {
    fn clear(&mut self) {
        self.regions.clear();
        self.legend.clear();
        self.messages.clear();
    }

    fn region(&mut self, geometry: &MultiPolygon<f64>, fill: &str, payload: &ShapePayload) {
        let _ = writeln!(
            self.regions,
            "<path class=\"county\" data-fips=\"{fips}\" data-education=\"{value}\" \
             data-state=\"{label}\" fill=\"{fill}\" d=\"{d}\"><title>{label} : {value}%</title></path>",
            fips = xml_escape(&payload.fips),
            value = payload.value,
            label = xml_escape(&payload.label),
            fill = xml_escape(fill),
            d = path_data(geometry),
        );
    }

    fn legend_swatch(&mut self, x: f64, y: f64, size: f64, fill: &str, bounds: (f64, f64)) {
        let _ = writeln!(
            self.legend,
            "<rect x=\"{x}\" y=\"{y}\" width=\"{size}\" height=\"{size}\" stroke=\"black\" \
             stroke-width=\"0.5\" fill=\"{fill}\"><title>{lo} to {hi}</title></rect>",
            fill = xml_escape(fill),
            lo = bounds.0,
            hi = bounds.1,
        );
    }

    fn message(&mut self, text: &str) {
        let _ = writeln!(
            self.messages,
            "<text x=\"{x}\" y=\"{y}\" text-anchor=\"middle\" font-size=\"24\">{text}</text>",
            x = self.width as f64 / 2.0,
            y = self.height as f64 / 2.0,
            text = xml_escape(text),
        );
    }
}

/// Path data for a projected multipolygon: one closed subpath per ring.
/// Coordinates are already in surface space, so this is direct emission, not
/// projection.
fn path_data(geometry: &MultiPolygon<f64>) -> String {
    let mut d = String::new();
    for polygon in &geometry.0 {
        ring_path(&mut d, polygon.exterior());
        for interior in polygon.interiors() {
            ring_path(&mut d, interior);
        }
    }
    d
}

fn ring_path(d: &mut String, ring: &geo::LineString<f64>) {
    for (i, coord) in ring.0.iter().enumerate() {
        // The trailing closing coordinate is implied by Z.
        if i + 1 == ring.0.len() && i > 0 && ring.0[0] == *coord {
            break;
        }
        let _ = write!(d, "{}{},{}", if i == 0 { 'M' } else { 'L' }, coord.x, coord.y);
    }
    d.push('Z');
}

fn xml_escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{path_data, xml_escape, Surface, SvgSurface};
    use crate::types::ShapePayload;
    use geo::{Coord, LineString, MultiPolygon, Polygon};

    fn unit_square() -> MultiPolygon<f64> {
        let ring = LineString::new(vec![
            Coord { x: 0.0, y: 0.0 },
            Coord { x: 10.0, y: 0.0 },
            Coord { x: 10.0, y: 10.0 },
            Coord { x: 0.0, y: 10.0 },
            Coord { x: 0.0, y: 0.0 },
        ]);
        MultiPolygon::new(vec![Polygon::new(ring, vec![])])
    }

    #[test]
    fn path_data_closes_rings_without_repeating_the_seam() {
        assert_eq!(path_data(&unit_square()), "M0,0L10,0L10,10L0,10Z");
    }

    #[test]
    fn region_paths_carry_payload_attributes() {
        let mut surface = SvgSurface::new(100, 100);
        surface.region(
            &unit_square(),
            "#2171b5",
            &ShapePayload {
                fips: "01001".to_string(),
                label: "Autauga, AL".to_string(),
                value: 20.9,
            },
        );

        let doc = surface.finish();
        assert!(doc.contains("data-fips=\"01001\""));
        assert!(doc.contains("data-education=\"20.9\""));
        assert!(doc.contains("data-state=\"Autauga, AL\""));
        assert!(doc.contains("fill=\"#2171b5\""));
        assert!(doc.contains("<title>Autauga, AL : 20.9%</title>"));
    }

    #[test]
    fn labels_are_escaped_for_attributes() {
        assert_eq!(xml_escape("Prince George's, MD"), "Prince George&apos;s, MD");
        assert_eq!(xml_escape("a<b>&\"c\""), "a&lt;b&gt;&amp;&quot;c&quot;");
    }

    #[test]
    fn clear_empties_the_document() {
        let mut surface = SvgSurface::new(100, 100);
        surface.legend_swatch(0.0, 0.0, 18.0, "#ffffff", (0.0, 1.0));
        surface.clear();
        assert!(!surface.finish().contains("<rect"));
    }
}
