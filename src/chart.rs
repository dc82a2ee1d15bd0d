use async_trait::async_trait;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder};
use plotters::prelude::*;

use crate::error::ProviderError;
use crate::types::{ChartImage, IndicatorPoint, Trend};

/// Everything the renderer needs for one alert chart.
#[derive(Debug, Clone)]
pub struct ChartRequest {
    pub symbol: String,
    pub rows: Vec<IndicatorPoint>,
    pub trend: Trend,
    pub market_cap_label: String,
    pub atr: f64,
    pub rsi: f64,
}

#[async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(&self, request: &ChartRequest) -> Result<ChartImage, ProviderError>;
}

// ---------------------------------------------------------------------------
// PNG renderer
// ---------------------------------------------------------------------------

const WIDTH: u32 = 1200;
const HEIGHT: u32 = 700;

const BACKGROUND: RGBColor = RGBColor(0x1a, 0x1a, 0x1a);
const TEXT: RGBColor = RGBColor(0xd3, 0xd3, 0xd3);
const GRID: RGBColor = RGBColor(0x55, 0x55, 0x55);
const PRICE: RGBColor = RGBColor(0x00, 0xff, 0x00);
const SMA: RGBColor = RGBColor(0x00, 0xff, 0xff);

/// Label the date axis every this many bars.
const DATE_LABEL_EVERY: usize = 10;
const Y_TICKS: usize = 6;

/// Dark-theme close/SMA line chart with the gap between them shaded green
/// (close above) or red (close below), encoded as PNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngChartRenderer;

#[async_trait]
impl ChartRenderer for PngChartRenderer {
    async fn render(&self, request: &ChartRequest) -> Result<ChartImage, ProviderError> {
        let req = request.clone();
        let bytes = tokio::task::spawn_blocking(move || render_png(&req))
            .await
            .map_err(|e| render_error(&request.symbol, e))??;
        Ok(ChartImage {
            bytes,
            media_type: "image/png",
            file_name: format!("{}.png", request.symbol),
        })
    }
}

pub fn render_png(req: &ChartRequest) -> Result<Vec<u8>, ProviderError> {
    let rgb = draw_rgb(req)?;
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(&rgb, WIDTH, HEIGHT, ColorType::Rgb8)
        .map_err(|e| render_error(&req.symbol, e))?;
    Ok(png)
}

/// Draw the chart into a raw RGB buffer.
fn draw_rgb(req: &ChartRequest) -> Result<Vec<u8>, ProviderError> {
    let n = req.rows.len();
    if n < 2 {
        return Err(ProviderError::Render(format!(
            "{}: need at least 2 rows, got {n}",
            req.symbol
        )));
    }

    let (lo, hi) = req
        .rows
        .iter()
        .flat_map(|p| [p.bar.close, p.sma_long])
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return Err(ProviderError::Render(format!("{}: non-finite values", req.symbol)));
    }
    let pad = ((hi - lo) * 0.05).max(hi.abs() * 0.001).max(1e-6);
    let (lo, hi) = (lo - pad, hi + pad);
    let fail = |e: DrawingAreaErrorKind<_>| render_error(&req.symbol, e);

    let mut buf = vec![0u8; (WIDTH * HEIGHT * 3) as usize];
    {
        let root = BitMapBackend::with_buffer(&mut buf, (WIDTH, HEIGHT)).into_drawing_area();
        root.fill(&BACKGROUND).map_err(fail)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(
                chart_title(req),
                ("sans-serif", 22).into_font().style(FontStyle::Bold).color(&WHITE),
            )
            .margin(20)
            .x_label_area_size(70)
            .y_label_area_size(80)
            .build_cartesian_2d(0f64..(n - 1) as f64, lo..hi)
            .map_err(fail)?;

        let date_label = |x: &f64| {
            req.rows
                .get(x.round().max(0.0) as usize)
                .map(|p| p.bar.date.format("%Y-%m-%d").to_string())
                .unwrap_or_default()
        };
        let price_label = |v: &f64| format!("{v:.2}");
        chart
            .configure_mesh()
            .light_line_style(TRANSPARENT)
            .bold_line_style(GRID.mix(0.6))
            .axis_style(GRID)
            .x_labels(n.div_ceil(DATE_LABEL_EVERY) + 1)
            .y_labels(Y_TICKS)
            .x_label_formatter(&date_label)
            .y_label_formatter(&price_label)
            .label_style(("sans-serif", 13).into_font().color(&TEXT))
            .y_desc("Price ($)")
            .axis_desc_style(("sans-serif", 15).into_font().color(&TEXT))
            .draw()
            .map_err(fail)?;

        // One quad per segment between close and SMA.
        chart
            .draw_series(req.rows.windows(2).enumerate().filter_map(|(i, pair)| {
                let (a, b) = (&pair[0], &pair[1]);
                let gap = (a.bar.close - a.sma_long) + (b.bar.close - b.sma_long);
                let color = if gap > 0.0 {
                    GREEN
                } else if gap < 0.0 {
                    RED
                } else {
                    return None;
                };
                let (x0, x1) = (i as f64, (i + 1) as f64);
                Some(Polygon::new(
                    vec![(x0, a.bar.close), (x1, b.bar.close), (x1, b.sma_long), (x0, a.sma_long)],
                    color.mix(0.15).filled(),
                ))
            }))
            .map_err(fail)?;

        chart
            .draw_series(LineSeries::new(
                req.rows.iter().enumerate().map(|(i, p)| (i as f64, p.bar.close)),
                PRICE.stroke_width(2),
            ))
            .map_err(fail)?
            .label("Price")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 24, y)], PRICE.stroke_width(2)));

        chart
            .draw_series(DashedLineSeries::new(
                req.rows.iter().enumerate().map(|(i, p)| (i as f64, p.sma_long)),
                8,
                5,
                SMA.stroke_width(2),
            ))
            .map_err(fail)?
            .label("SMA")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 24, y)], SMA.stroke_width(2)));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperLeft)
            .background_style(BACKGROUND.mix(0.8))
            .border_style(GRID)
            .label_font(("sans-serif", 14).into_font().color(&TEXT))
            .draw()
            .map_err(fail)?;

        root.present().map_err(fail)?;
    }
    Ok(buf)
}

/// Plain-text title; the chart font has no emoji glyphs.
pub fn chart_title(req: &ChartRequest) -> String {
    format!(
        "{} | Trend: {} | Cap: {} | ATR: {:.2} | RSI: {:.1}",
        req.symbol,
        req.trend.name(),
        req.market_cap_label,
        req.atr,
        req.rsi
    )
}

fn render_error(symbol: &str, e: impl std::fmt::Display) -> ProviderError {
    ProviderError::Render(format!("{symbol}: {e}"))
}
