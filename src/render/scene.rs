//! Chart compositor: turns a [`FrameSpec`] into premultiplied RGBA pixels.
//!
//! The layout is points-based: font sizes and thumbnail metrics are given in
//! points against a 1526.4 pt tall canvas and scaled to the output height, so
//! the chart looks the same at any resolution.

use std::sync::Arc;

use crate::{
    anim::{interp::FrameSpec, lookup},
    assets::{fonts::FontSet, thumbs::ThumbCache},
    data::event::{Metric, RankBy},
    foundation::{
        core::{Canvas, Rgba8, format_thousands},
        error::{RaceError, RaceResult},
    },
    render::{
        backend::FrameRGBA,
        text::{TextBrushRgba8, TextLayoutEngine},
    },
};

const BACKGROUND: Rgba8 = Rgba8::opaque(0xF0, 0xF0, 0xF0);
const BAR_EDGE: Rgba8 = Rgba8::opaque(0xD3, 0xD3, 0xD3);
const MUTED: Rgba8 = Rgba8::opaque(0xA9, 0xA9, 0xA9);
const INK: Rgba8 = Rgba8::opaque(0x20, 0x20, 0x20);
const BAR_ALPHA: f32 = 0.7;
const BAR_EDGE_PX: f64 = 1.2;

/// Reference layout height in points; `size_pt * height / this` is pixels.
const LAYOUT_HEIGHT_PT: f64 = 1526.4;

// Plot rectangle as canvas fractions, top-down.
const PLOT_LEFT: f64 = 0.27;
const PLOT_RIGHT: f64 = 0.85;
const PLOT_TOP: f64 = 0.20;
const PLOT_BOTTOM: f64 = 0.87;

#[derive(Clone, Copy)]
enum Face {
    Heading,
    Label,
}

#[derive(Clone, Copy)]
enum Anchor {
    Left,
    Right,
    Center,
}

#[derive(Clone)]
struct ThumbPaint {
    name: String,
    paint: vello_cpu::Image,
    width: u32,
    height: u32,
}

/// Maps chart data coordinates into canvas pixels for one frame.
struct Geom {
    x0: f64,
    x1: f64,
    y_top: f64,
    y_bot: f64,
    ymin: f64,
    ymax: f64,
    axis_max: f64,
}

impl Geom {
    fn x(&self, value: f64) -> f64 {
        self.x0 + value / self.axis_max * (self.x1 - self.x0)
    }

    fn y(&self, data_y: f64) -> f64 {
        self.y_bot - (data_y - self.ymin) / (self.ymax - self.ymin) * (self.y_bot - self.y_top)
    }
}

pub struct SceneRenderer {
    canvas: Canvas,
    rank_by: RankBy,
    metric: Metric,
    top_n: usize,
    title: String,
    fonts: FontSet,
    heading_font: Option<vello_cpu::peniko::FontData>,
    label_font: Option<vello_cpu::peniko::FontData>,
    text_engine: TextLayoutEngine,
    ctx: Option<vello_cpu::RenderContext>,
    pixmap: Option<vello_cpu::Pixmap>,
    /// Per-slot thumbnail paint, rebuilt only when the name bound to the slot
    /// changes.
    thumb_paints: Vec<Option<ThumbPaint>>,
}

impl SceneRenderer {
    pub fn new(
        canvas: Canvas,
        rank_by: RankBy,
        metric: Metric,
        top_n: usize,
        title: Option<String>,
        fonts: FontSet,
    ) -> RaceResult<Self> {
        if canvas.width == 0 || canvas.height == 0 {
            return Err(RaceError::validation("canvas dimensions must be non-zero"));
        }
        if canvas.width > u16::MAX as u32 || canvas.height > u16::MAX as u32 {
            return Err(RaceError::validation("canvas dimensions exceed u16"));
        }
        let font_data = |bytes: &Option<Arc<Vec<u8>>>| {
            bytes.as_ref().map(|b| {
                vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(b.as_ref().clone()), 0)
            })
        };
        Ok(Self {
            canvas,
            rank_by,
            metric,
            top_n,
            title: title.unwrap_or_else(|| rank_by.title(metric).to_string()),
            heading_font: font_data(&fonts.heading),
            label_font: font_data(&fonts.label),
            fonts,
            text_engine: TextLayoutEngine::new(),
            ctx: None,
            pixmap: None,
            thumb_paints: vec![None; top_n],
        })
    }

    fn pt_to_px(&self, pt: f64) -> f64 {
        pt * self.canvas.height as f64 / LAYOUT_HEIGHT_PT
    }

    fn geom(&self, axis_max: f64) -> Geom {
        let w = self.canvas.width as f64;
        let h = self.canvas.height as f64;
        let positions = lookup::slot_positions(self.top_n);
        let bar_h = lookup::bar_height(self.top_n);
        let top_pos = positions.iter().copied().fold(f64::MIN, f64::max);
        let bottom_pos = positions.iter().copied().fold(f64::MAX, f64::min);
        Geom {
            x0: PLOT_LEFT * w,
            x1: PLOT_RIGHT * w,
            y_top: PLOT_TOP * h,
            y_bot: PLOT_BOTTOM * h,
            ymin: bottom_pos - lookup::BOTTOM_GAP - bar_h / 2.0,
            ymax: top_pos + lookup::TOP_GAP + bar_h / 2.0,
            axis_max: axis_max.max(1e-9),
        }
    }

    fn with_ctx_mut<R>(
        &mut self,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> RaceResult<R>,
    ) -> RaceResult<R> {
        let width = self.canvas.width as u16;
        let height = self.canvas.height as u16;
        let mut ctx = match self.ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(self, &mut ctx)?;
        self.ctx = Some(ctx);
        Ok(out)
    }

    /// Rasterize one frame of the race.
    pub fn render_frame(
        &mut self,
        spec: &FrameSpec,
        thumbs: &ThumbCache,
    ) -> RaceResult<FrameRGBA> {
        let width = self.canvas.width;
        let height = self.canvas.height;
        let w = width as f64;
        let h = height as f64;
        let geom = self.geom(spec.axis_max);
        let bar_h_px = lookup::bar_height(self.top_n) / (geom.ymax - geom.ymin)
            * (geom.y_bot - geom.y_top);
        let label_pt = lookup::label_font_pt(self.top_n, self.rank_by);

        let mut pixmap = match self.pixmap.take() {
            Some(pm) if pm.width() as u32 == width && pm.height() as u32 == height => pm,
            _ => vello_cpu::Pixmap::new(width as u16, height as u16),
        };

        self.with_ctx_mut(|this, ctx| {
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_paint(color_of(BACKGROUND));
            ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));

            this.draw_text(
                ctx,
                Face::Heading,
                &this.title.clone(),
                56.0,
                INK,
                Anchor::Center,
                0.54 * w,
                0.07 * h,
            )?;

            for (i, slot) in spec.slots.iter().enumerate() {
                if !slot.active {
                    continue;
                }
                let tip_x = geom.x(slot.display_width);
                let center_y = geom.y(slot.position);
                let thumb = this.thumb_paint_for(i, &slot.name, thumbs)?;
                let tint = thumbs
                    .ready(&slot.name, this.top_n)
                    .map(|t| t.dominant)
                    .unwrap_or(BAR_EDGE);

                // Bar body with a light edge, both at the chart's bar opacity.
                let bar = vello_cpu::kurbo::Rect::new(
                    geom.x(0.0),
                    center_y - bar_h_px / 2.0,
                    tip_x,
                    center_y + bar_h_px / 2.0,
                );
                ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
                ctx.push_opacity_layer(BAR_ALPHA);
                ctx.set_paint(color_of(BAR_EDGE));
                ctx.fill_rect(&bar);
                if bar.width() > 3.0 * BAR_EDGE_PX && bar.height() > 3.0 * BAR_EDGE_PX {
                    ctx.set_paint(color_of(tint));
                    ctx.fill_rect(&bar.inset(-BAR_EDGE_PX));
                }
                ctx.pop_layer();

                if let Some(tp) = thumb {
                    this.draw_thumb(ctx, &tp, tip_x, center_y);
                }

                this.draw_text(
                    ctx,
                    Face::Label,
                    &format_thousands(slot.value),
                    24.0,
                    INK,
                    Anchor::Left,
                    geom.x(slot.display_width + spec.value_offset),
                    center_y,
                )?;

                if !slot.label.is_empty() {
                    this.draw_text(
                        ctx,
                        Face::Label,
                        &slot.label.clone(),
                        label_pt,
                        INK,
                        Anchor::Right,
                        geom.x(-spec.value_offset),
                        center_y,
                    )?;
                }

                if !slot.caption.is_empty() {
                    let dy = lookup::caption_offset(this.top_n, slot.label_lines);
                    this.draw_text(
                        ctx,
                        Face::Label,
                        &slot.caption.clone(),
                        label_pt - 2.0,
                        MUTED,
                        Anchor::Right,
                        geom.x(-spec.value_offset),
                        geom.y(slot.position - dy),
                    )?;
                }
            }

            // Date readout and axis caption live in plot-relative coords.
            let plot_w = geom.x1 - geom.x0;
            let plot_h = geom.y_bot - geom.y_top;
            this.draw_text(
                ctx,
                Face::Heading,
                &spec.at.format("%Y").to_string(),
                34.0,
                MUTED,
                Anchor::Left,
                geom.x0 + 0.78 * plot_w,
                geom.y_bot - 0.10 * plot_h,
            )?;
            this.draw_text(
                ctx,
                Face::Heading,
                &spec.at.format("%B").to_string(),
                34.0,
                MUTED,
                Anchor::Left,
                geom.x0 + 0.78 * plot_w,
                geom.y_bot - 0.05 * plot_h,
            )?;
            this.draw_text(
                ctx,
                Face::Heading,
                this.metric.axis_caption(),
                28.0,
                MUTED,
                Anchor::Center,
                geom.x0 + 0.38 * plot_w,
                geom.y_bot + 0.033 * plot_h,
            )?;

            ctx.flush();
            ctx.render_to_pixmap(&mut pixmap);
            Ok(())
        })?;

        let out = FrameRGBA {
            width,
            height,
            data: pixmap.data_as_u8_slice().to_vec(),
        };
        self.pixmap = Some(pixmap);
        Ok(out)
    }

    fn draw_thumb(
        &self,
        ctx: &mut vello_cpu::RenderContext,
        tp: &ThumbPaint,
        tip_x: f64,
        center_y: f64,
    ) {
        let edge_px =
            self.pt_to_px(lookup::bar_height(self.top_n) * lookup::thumb_scale(self.top_n));
        let center_x = tip_x + self.pt_to_px(lookup::thumb_offset_x(self.top_n));
        let scale = edge_px / tp.height.max(1) as f64;
        let draw_w = tp.width as f64 * scale;
        let origin = vello_cpu::kurbo::Affine::translate((
            center_x - draw_w / 2.0,
            center_y - edge_px / 2.0,
        ));
        ctx.set_transform(origin * vello_cpu::kurbo::Affine::scale(scale));
        ctx.set_paint(tp.paint.clone());
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            tp.width as f64,
            tp.height as f64,
        ));
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }

    fn thumb_paint_for(
        &mut self,
        slot: usize,
        name: &str,
        thumbs: &ThumbCache,
    ) -> RaceResult<Option<ThumbPaint>> {
        if let Some(tp) = self.thumb_paints.get(slot).and_then(|x| x.as_ref())
            && tp.name == name
        {
            return Ok(Some(tp.clone()));
        }
        let Some(img) = thumbs.ready(name, self.top_n) else {
            self.thumb_paints[slot] = None;
            return Ok(None);
        };
        let pixmap = pixmap_from_premul_bytes(&img.rgba8_premul, img.width, img.height)?;
        let tp = ThumbPaint {
            name: name.to_string(),
            paint: vello_cpu::Image {
                image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
                sampler: vello_cpu::peniko::ImageSampler::default(),
            },
            width: img.width,
            height: img.height,
        };
        self.thumb_paints[slot] = Some(tp.clone());
        Ok(Some(tp))
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_text(
        &mut self,
        ctx: &mut vello_cpu::RenderContext,
        face: Face,
        text: &str,
        size_pt: f64,
        color: Rgba8,
        anchor: Anchor,
        x: f64,
        y_center: f64,
    ) -> RaceResult<()> {
        let (bytes, font) = match face {
            Face::Heading => (&self.fonts.heading, &self.heading_font),
            Face::Label => (&self.fonts.label, &self.label_font),
        };
        let (Some(bytes), Some(font)) = (bytes.clone(), font.clone()) else {
            return Ok(());
        };
        if text.is_empty() {
            return Ok(());
        }

        let size_px = self.pt_to_px(size_pt) as f32;
        let brush = TextBrushRgba8 {
            r: color.r,
            g: color.g,
            b: color.b,
            a: color.a,
        };
        let layout = self
            .text_engine
            .layout_plain(text, &bytes, size_px, brush, None)?;

        let origin_x = match anchor {
            Anchor::Left => x,
            Anchor::Right => x - layout.width() as f64,
            Anchor::Center => x - layout.width() as f64 / 2.0,
        };
        let origin_y = y_center - layout.height() as f64 / 2.0;
        ctx.set_transform(vello_cpu::kurbo::Affine::translate((origin_x, origin_y)));

        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let b = run.style().brush;
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(b.r, b.g, b.b, b.a));
                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                ctx.glyph_run(&font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        Ok(())
    }
}

fn color_of(c: Rgba8) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn pixmap_from_premul_bytes(
    bytes: &[u8],
    width: u32,
    height: u32,
) -> RaceResult<vello_cpu::Pixmap> {
    let w: u16 = width
        .try_into()
        .map_err(|_| RaceError::render("pixmap width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| RaceError::render("pixmap height exceeds u16"))?;
    if bytes.len()
        != (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4)
    {
        return Err(RaceError::render("pixmap byte len mismatch"));
    }
    let mut pixels = Vec::<vello_cpu::peniko::color::PremulRgba8>::with_capacity(
        (width as usize) * (height as usize),
    );
    for px in bytes.chunks_exact(4) {
        pixels.push(vello_cpu::peniko::color::PremulRgba8::from_u8_array([
            px[0], px[1], px[2], px[3],
        ]));
    }
    Ok(vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, true))
}
