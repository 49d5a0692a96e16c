use std::io::{self, IsTerminal};

use crate::calendar::DayRecord;
use crate::config::Config;
use crate::layout::{self, GridLayout, LayoutError};

const DOT_COLOR: &str = "#e8e6e3";

/// Maps day records and a solved grid onto output surfaces. Rendering
/// never reclassifies days and never reads the clock.
#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    #[must_use]
    pub fn new(cfg: &Config) -> Self {
        Self { color: cfg.color }
    }

    /// One glyph per dot, `columns` dots per line: filled for past
    /// days, outline for today and the future.
    #[must_use]
    pub fn render_terminal(&self, days: &[DayRecord], grid: &GridLayout) -> String {
        let columns = (grid.columns as usize).max(1);
        let mut out = String::with_capacity(days.len() * 4);

        for (idx, day) in days.iter().enumerate() {
            if idx > 0 {
                if idx % columns == 0 {
                    out.push('\n');
                } else {
                    out.push(' ');
                }
            }
            if day.is_past {
                out.push_str(&self.paint("●", "90"));
            } else {
                out.push('○');
            }
        }

        out.push('\n');
        out
    }

    /// SVG document sized to the grid extent, one circle per day.
    #[must_use]
    pub fn render_svg(&self, days: &[DayRecord], grid: &GridLayout) -> String {
        let pitch = grid.diameter + grid.gap;
        let radius = f64::from(grid.diameter) / 2.0;
        let stroke = ((f64::from(grid.diameter) * 0.12).floor() as u32).max(1);
        let width = grid.width();
        let height = grid.height();

        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" \
             viewBox=\"0 0 {width} {height}\">\n"
        );

        let columns = (grid.columns as usize).max(1);
        for (idx, day) in days.iter().enumerate() {
            let col = (idx % columns) as u32;
            let row = (idx / columns) as u32;
            let cx = f64::from(col * pitch) + radius;
            let cy = f64::from(row * pitch) + radius;

            if day.is_past {
                svg.push_str(&format!(
                    "  <circle cx=\"{cx}\" cy=\"{cy}\" r=\"{radius}\" fill=\"{DOT_COLOR}\"/>\n"
                ));
            } else {
                // Keep the border inside the dot's diameter.
                let r = (radius - f64::from(stroke) / 2.0).max(0.5);
                svg.push_str(&format!(
                    "  <circle cx=\"{cx}\" cy=\"{cy}\" r=\"{r}\" fill=\"none\" \
                     stroke=\"{DOT_COLOR}\" stroke-width=\"{stroke}\"/>\n"
                ));
            }
        }

        svg.push_str("</svg>\n");
        svg
    }

    /// Minimal dark page embedding the grid, for the serve mode.
    #[must_use]
    pub fn render_page(&self, svg: &str) -> String {
        format!(
            "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
             <title>dotwall</title>\n\
             <style>html,body{{margin:0;height:100%;background:#000;display:flex;\
             align-items:center;justify-content:center;overflow:hidden}}</style>\n\
             </head>\n<body>\n{svg}</body>\n</html>\n"
        )
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color || !io::stdout().is_terminal() {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

/// Grid for a character-cell surface. Dots are one cell wide with a
/// one-cell gap, so the solver sees half the terminal width in
/// dot-pitch units; one row is held back for the cursor line.
pub fn terminal_grid(n: usize, cols: u16, rows: u16) -> Result<GridLayout, LayoutError> {
    let width = (f64::from(cols) / 2.0).max(1.0);
    let height = f64::from(rows.saturating_sub(1)).max(1.0);
    layout::solve_layout(n, width, height)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Renderer, terminal_grid};
    use crate::calendar::DayRecord;
    use crate::layout::GridLayout;

    fn sample_days(past: usize, future: usize) -> Vec<DayRecord> {
        let base = NaiveDate::from_ymd_opt(2024, 3, 1).expect("valid date");
        (0..past + future)
            .map(|i| DayRecord {
                date: base + chrono::Duration::days(i as i64),
                is_past: i < past,
            })
            .collect()
    }

    fn plain_renderer() -> Renderer {
        Renderer { color: false }
    }

    #[test]
    fn terminal_output_wraps_at_the_column_count() {
        let days = sample_days(2, 3);
        let grid = GridLayout {
            columns: 3,
            rows: 2,
            diameter: 10,
            gap: 6,
        };

        let out = plain_renderer().render_terminal(&days, &grid);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].chars().filter(|c| *c == '●' || *c == '○').count(), 3);
        assert_eq!(out.matches('●').count(), 2);
        assert_eq!(out.matches('○').count(), 3);
    }

    #[test]
    fn svg_draws_one_circle_per_day() {
        let days = sample_days(4, 6);
        let grid = GridLayout {
            columns: 5,
            rows: 2,
            diameter: 40,
            gap: 26,
        };

        let svg = plain_renderer().render_svg(&days, &grid);
        assert_eq!(svg.matches("<circle").count(), 10);
        assert_eq!(svg.matches("fill=\"none\"").count(), 6);
        // Border width follows the dot: floor(40 * 0.12) = 4.
        assert!(svg.contains("stroke-width=\"4\""));
        assert!(svg.contains("width=\"304\""));
    }

    #[test]
    fn svg_border_never_vanishes() {
        let days = sample_days(0, 1);
        let grid = GridLayout {
            columns: 1,
            rows: 1,
            diameter: 3,
            gap: 2,
        };

        let svg = plain_renderer().render_svg(&days, &grid);
        assert!(svg.contains("stroke-width=\"1\""));
    }

    #[test]
    fn page_embeds_the_svg() {
        let renderer = plain_renderer();
        let days = sample_days(1, 1);
        let grid = GridLayout {
            columns: 2,
            rows: 1,
            diameter: 10,
            gap: 6,
        };

        let svg = renderer.render_svg(&days, &grid);
        let page = renderer.render_page(&svg);
        assert!(page.contains("<svg"));
        assert!(page.contains("background:#000"));
    }

    #[test]
    fn terminal_grid_fits_the_cell_count() {
        let grid = terminal_grid(365, 120, 40).expect("solve");
        // Printed width is two cells per column minus the last gap.
        assert!(grid.columns * 2 - 1 <= 120);
        assert!(grid.rows <= 39);
    }
}
