//! Renderers turn a finished [`PlotDescriptor`] into text.
//!
//! [`RScriptRenderer`] emits a self-contained R script in the style of the
//! classic ppbench plots (base graphics, smoothed splines, dashed receive
//! window guides). [`JsonRenderer`] dumps the descriptor for other tooling.

use crate::error::Result;
use crate::plot::{PlotDescriptor, PlotKind, SeriesSpec};
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::path::PathBuf;

/// Point symbol used in the legend when no scatter points are drawn
const LEGEND_LINE_SYMBOL: u32 = 16;

/// Below this many buckets R cannot fit a smoothing spline
const MIN_SPLINE_POINTS: usize = 4;

pub trait PlotRenderer {
    fn render(&self, plot: &PlotDescriptor) -> Result<String>;
}

/// The descriptor as pretty-printed JSON
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRenderer;

impl PlotRenderer for JsonRenderer {
    fn render(&self, plot: &PlotDescriptor) -> Result<String> {
        Ok(serde_json::to_string_pretty(plot)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Pdf,
    Png,
}

/// Fixed-size file output wrapped around the generated script
#[derive(Debug, Clone, PartialEq)]
pub struct Export {
    pub format: ExportFormat,
    pub width_cm: f64,
    pub height_cm: f64,
    pub file: PathBuf,
}

#[derive(Debug, Default, Clone)]
pub struct RScriptRenderer {
    export: Option<Export>,
}

impl RScriptRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_export(export: Export) -> Self {
        Self {
            export: Some(export),
        }
    }
}

/// R literal of a number
fn num(value: f64) -> String {
    if value.is_nan() {
        "NA".to_string()
    } else if value.is_infinite() {
        let literal = if value > 0.0 { "Inf" } else { "-Inf" };
        literal.to_string()
    } else {
        value.to_string()
    }
}

/// Single-quoted R string literal
fn quote(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// `c(...)` vector literal
fn vector<I: IntoIterator<Item = f64>>(values: I) -> String {
    let items: Vec<String> = values.into_iter().map(num).collect();
    format!("c({})", items.join(","))
}

fn smooth(name: &str, ys: &str, knots: usize, buckets: usize) -> String {
    if buckets < MIN_SPLINE_POINTS {
        format!("{} <- list(x=xs, y={})\n", name, ys)
    } else {
        format!("{} <- smooth.spline(xs, {}, nknots={})\n", name, ys, knots.min(buckets))
    }
}

impl RScriptRenderer {
    fn canvas(&self, plot: &PlotDescriptor, out: &mut String) -> fmt::Result {
        let main = if plot.subtitle.is_empty() {
            plot.title.clone()
        } else {
            format!("{}\n({})", plot.title, plot.subtitle)
        };
        writeln!(
            out,
            "plot(x=c(0), y=c(0), xlim=c(0, {}), ylim=c(0, {}), main={}, xlab={}, ylab={}, xaxt='n', yaxt='n', pch=NA)",
            num(plot.x.max),
            num(plot.y.max),
            quote(&main),
            quote(&format!("{} ({})", plot.x.title, plot.x.unit)),
            quote(&format!("{} ({})", plot.y.title, plot.y.unit)),
        )?;
        if !plot.markers.is_empty() {
            writeln!(
                out,
                "abline(v = {}, lty='dashed')",
                vector(plot.markers.iter().map(|&m| m as f64))
            )?;
        }
        Ok(())
    }

    fn series(&self, plot: &PlotDescriptor, series: &SeriesSpec, out: &mut String) -> fmt::Result {
        let color = &series.color;
        writeln!(out, "\n# {}", series.name)?;

        if let Some(points) = &series.points {
            writeln!(out, "xs = {}", vector(points.iter().map(|p| p.0 as f64)))?;
            writeln!(out, "ys = {}", vector(points.iter().map(|p| p.1)))?;
            writeln!(
                out,
                "points(x=xs, y=ys, col=rgb({},alpha={}), pch={})",
                color,
                num(plot.alpha),
                series.symbol
            )?;
        }

        if let Some(band) = &series.band {
            let knots = plot.smoothing_knots;
            let n = band.len();
            writeln!(out, "xs = {}", vector(band.iter().map(|b| b.x as f64)))?;
            writeln!(out, "medians = {}", vector(band.iter().map(|b| b.median)))?;
            writeln!(out, "lowers = {}", vector(band.iter().map(|b| b.p_low)))?;
            writeln!(out, "semi_lowers = {}", vector(band.iter().map(|b| b.p_semi_low)))?;
            writeln!(out, "semi_uppers = {}", vector(band.iter().map(|b| b.p_semi_high)))?;
            writeln!(out, "uppers = {}", vector(band.iter().map(|b| b.p_high)))?;
            out.push_str(&smooth("low", "lowers", knots, n));
            out.push_str(&smooth("semi_low", "semi_lowers", knots, n));
            out.push_str(&smooth("up", "uppers", knots, n));
            out.push_str(&smooth("semi_up", "semi_uppers", knots, n));
            out.push_str(&smooth("median", "medians", knots, n));
            writeln!(
                out,
                "polygon(c(low$x, rev(up$x)), c(low$y, rev(up$y)), col=rgb({},alpha=0.10), border=NA)",
                color
            )?;
            writeln!(
                out,
                "polygon(c(semi_low$x, rev(semi_up$x)), c(semi_low$y, rev(semi_up$y)), col=rgb({},alpha=0.15), border=NA)",
                color
            )?;
            writeln!(out, "lines(median, lwd=2, col=rgb({}))", color)?;
            writeln!(out, "lines(low, col=rgb({},alpha=0.50), lty='dashed', lwd=0.5)", color)?;
            writeln!(out, "lines(up, col=rgb({},alpha=0.50), lty='dashed', lwd=0.5)", color)?;
        }

        if let Some(line) = &series.line {
            writeln!(out, "xs = {}", vector(line.iter().map(|p| p.0 as f64)))?;
            writeln!(out, "ys = {}", vector(line.iter().map(|p| p.1)))?;
            out.push_str(&smooth("median", "ys", plot.smoothing_knots, line.len()));
            writeln!(out, "lines(median, lwd=2, col=rgb({}))", color)?;
        }
        Ok(())
    }

    fn axes_and_legend(&self, plot: &PlotDescriptor, out: &mut String) -> fmt::Result {
        let separator = match plot.kind {
            PlotKind::Absolute => " ",
            PlotKind::Comparison => "",
        };
        writeln!(out, "\nxa = {}", vector(plot.x.ticks()))?;
        writeln!(out, "ya = {}", vector(plot.y.ticks()))?;
        writeln!(
            out,
            "axis(1, at = xa, labels = paste(xa/{}, {}, sep = {}))",
            num(plot.x.divisor),
            quote(&plot.x.unit),
            quote(" ")
        )?;
        writeln!(
            out,
            "axis(2, at = ya, labels = paste(ya/{}, {}, sep = {}))",
            num(plot.y.divisor),
            quote(&plot.y.unit),
            quote(separator)
        )?;

        let symbols: Vec<f64> = plot
            .series
            .iter()
            .map(|s| {
                if plot.legend_symbols {
                    s.symbol as f64
                } else {
                    LEGEND_LINE_SYMBOL as f64
                }
            })
            .collect();
        let colors: Vec<String> = plot
            .series
            .iter()
            .map(|s| format!("rgb({})", s.color))
            .collect();
        let names: Vec<String> = plot.series.iter().map(|s| quote(&s.name)).collect();
        writeln!(
            out,
            "legend({}, cex=0.9, pch={}, col=c({}), c({}), box.col=rgb(1,1,1,0), bg=rgb(1,1,1,0.75))",
            quote(&plot.legend_position.to_string()),
            vector(symbols),
            colors.join(","),
            names.join(",")
        )
    }

    fn write_script(&self, plot: &PlotDescriptor, out: &mut String) -> fmt::Result {
        if let Some(export) = &self.export {
            let file = quote(&export.file.to_string_lossy());
            match export.format {
                ExportFormat::Pdf => writeln!(
                    out,
                    "pdf({}, width={}, height={})",
                    file,
                    num(export.width_cm / 2.54),
                    num(export.height_cm / 2.54)
                )?,
                ExportFormat::Png => writeln!(
                    out,
                    "png({}, width={}, height={}, units='cm', res=300)",
                    file,
                    num(export.width_cm),
                    num(export.height_cm)
                )?,
            }
        }

        self.canvas(plot, out)?;
        for series in &plot.series {
            self.series(plot, series, out)?;
        }
        self.axes_and_legend(plot, out)?;

        if self.export.is_some() {
            out.push_str("invisible(dev.off())\n");
        }
        Ok(())
    }
}

impl PlotRenderer for RScriptRenderer {
    fn render(&self, plot: &PlotDescriptor) -> Result<String> {
        let mut out = String::new();
        self.write_script(plot, &mut out)?;
        Ok(out)
    }
}
