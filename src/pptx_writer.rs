//! Office Open XML (`.pptx`) writer for generated decks.
//!
//! The package is assembled by hand: one master, one blank layout, a theme
//! derived from the chosen palette, a cover slide and one slide per content
//! slide. All geometry is in inches and converted to EMU when written.
//! Parts carrying user text are emitted through `quick_xml::Writer`.

use chrono::{DateTime, Local};
use quick_xml::events::{BytesDecl, BytesText, Event};
use quick_xml::Writer;
use std::io::{Cursor, Write};
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::deck_theme::{Palette, Rgb, GRADIENT_END};
use crate::errors::DeckResult;
use crate::models::SlideRecord;

pub const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";

const EMU_PER_INCH: f64 = 914_400.0;
const EMU_PER_POINT: f64 = 12_700.0;
const SLIDE_WIDTH_IN: f64 = 13.333;
const SLIDE_HEIGHT_IN: f64 = 7.5;

const NS_A: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const NS_R: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NS_P: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";
const NS_RELS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const XML_DECL: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

const CT_BASE: &str = "application/vnd.openxmlformats-officedocument";

// Decorative circle positions, in inches
const CIRCLE_POSITIONS: [(f64, f64); 10] = [
    (0.3, 0.3), (12.7, 0.3), (0.3, 6.7), (12.7, 6.7),
    (2.5, 1.5), (10.5, 1.5), (2.5, 5.5), (10.5, 5.5),
    (6.5, 0.8), (6.5, 6.2),
];

type XmlWriter = Writer<Vec<u8>>;
type XmlResult<T> = Result<T, quick_xml::Error>;

fn emu(inches: f64) -> i64 {
    (inches * EMU_PER_INCH).round() as i64
}

// Drop characters XML 1.0 cannot carry; escaping is left to the writer
fn clean_text(text: &str) -> String {
    text.chars()
        .filter(|&c| c == '\t' || c == '\n' || c == '\r' || c >= ' ')
        .collect()
}

fn write_decl(w: &mut XmlWriter) -> XmlResult<()> {
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
}

fn empty(w: &mut XmlWriter, name: &str, attrs: &[(&str, &str)]) -> XmlResult<()> {
    w.create_element(name).with_attributes(attrs.iter().copied()).write_empty()?;
    Ok(())
}

/// Image container formats the writer can embed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
}

impl ImageFormat {
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            Some(Self::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(Self::Jpeg)
        } else if bytes.starts_with(b"GIF8") {
            Some(Self::Gif)
        } else {
            None
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Gif => "gif",
        }
    }

    fn content_type(&self) -> String {
        mime_guess::from_ext(self.extension()).first_or_octet_stream().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone, Copy)]
struct TextStyle {
    size_pt: f64,
    color: Rgb,
    bold: bool,
    italic: bool,
    font: &'static str,
    align: Align,
}

impl TextStyle {
    fn new(size_pt: f64, color: Rgb) -> Self {
        Self {
            size_pt,
            color,
            bold: false,
            italic: false,
            font: "Arial",
            align: Align::Left,
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    fn font(mut self, font: &'static str) -> Self {
        self.font = font;
        self
    }

    fn centered(mut self) -> Self {
        self.align = Align::Center;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct Rect {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
}

const fn rect(x: f64, y: f64, w: f64, h: f64) -> Rect {
    Rect { x, y, w, h }
}

#[derive(Debug, Clone, Copy)]
enum Outline {
    None,
    Solid { color: Rgb, width_pt: f64 },
}

fn write_xfrm(w: &mut XmlWriter, at: &Rect) -> XmlResult<()> {
    let (x, y) = (emu(at.x).to_string(), emu(at.y).to_string());
    let (cx, cy) = (emu(at.w).to_string(), emu(at.h).to_string());
    w.create_element("a:xfrm").write_inner_content(|w| -> XmlResult<()> {
        empty(w, "a:off", &[("x", x.as_str()), ("y", y.as_str())])?;
        empty(w, "a:ext", &[("cx", cx.as_str()), ("cy", cy.as_str())])
    })?;
    Ok(())
}

fn write_preset(w: &mut XmlWriter, preset: &str) -> XmlResult<()> {
    w.create_element("a:prstGeom")
        .with_attribute(("prst", preset))
        .write_inner_content(|w| -> XmlResult<()> { empty(w, "a:avLst", &[]) })?;
    Ok(())
}

fn write_solid_fill(w: &mut XmlWriter, color: Rgb, transparency: f64) -> XmlResult<()> {
    let hex = color.hex();
    w.create_element("a:solidFill").write_inner_content(|w| -> XmlResult<()> {
        if transparency > 0.0 {
            let alpha = ((1.0 - transparency) * 100_000.0).round().clamp(0.0, 100_000.0) as i64;
            let alpha = alpha.to_string();
            w.create_element("a:srgbClr")
                .with_attribute(("val", hex.as_str()))
                .write_inner_content(|w| -> XmlResult<()> { empty(w, "a:alpha", &[("val", alpha.as_str())]) })?;
            Ok(())
        } else {
            empty(w, "a:srgbClr", &[("val", hex.as_str())])
        }
    })?;
    Ok(())
}

fn write_no_fill(w: &mut XmlWriter) -> XmlResult<()> {
    empty(w, "a:noFill", &[])
}

fn write_outline(w: &mut XmlWriter, outline: Outline) -> XmlResult<()> {
    match outline {
        Outline::None => {
            w.create_element("a:ln").write_inner_content(write_no_fill)?;
        }
        Outline::Solid { color, width_pt } => {
            let width = ((width_pt * EMU_PER_POINT).round() as i64).to_string();
            w.create_element("a:ln")
                .with_attribute(("w", width.as_str()))
                .write_inner_content(|w| write_solid_fill(w, color, 0.0))?;
        }
    }
    Ok(())
}

fn write_paragraph(w: &mut XmlWriter, text: &str, style: &TextStyle) -> XmlResult<()> {
    let size = ((style.size_pt * 100.0).round() as i64).to_string();
    let bold = u8::from(style.bold).to_string();
    let italic = u8::from(style.italic).to_string();
    let run_props: [(&str, &str); 5] = [
        ("lang", "en-US"),
        ("sz", size.as_str()),
        ("b", bold.as_str()),
        ("i", italic.as_str()),
        ("dirty", "0"),
    ];
    let text = clean_text(text);

    w.create_element("a:p").write_inner_content(|w| -> XmlResult<()> {
        match style.align {
            Align::Left => empty(w, "a:pPr", &[])?,
            Align::Center => empty(w, "a:pPr", &[("algn", "ctr")])?,
        }
        if text.is_empty() {
            return empty(w, "a:endParaRPr", &run_props);
        }
        w.create_element("a:r").write_inner_content(|w| -> XmlResult<()> {
            w.create_element("a:rPr")
                .with_attributes(run_props.iter().copied())
                .write_inner_content(|w| -> XmlResult<()> {
                    write_solid_fill(w, style.color, 0.0)?;
                    empty(w, "a:latin", &[("typeface", style.font)])
                })?;
            w.create_element("a:t").write_text_content(BytesText::new(&text))?;
            Ok(())
        })?;
        Ok(())
    })?;
    Ok(())
}

fn write_group_header(w: &mut XmlWriter) -> XmlResult<()> {
    w.create_element("p:nvGrpSpPr").write_inner_content(|w| -> XmlResult<()> {
        empty(w, "p:cNvPr", &[("id", "1"), ("name", "")])?;
        empty(w, "p:cNvGrpSpPr", &[])?;
        empty(w, "p:nvPr", &[])
    })?;
    w.create_element("p:grpSpPr").write_inner_content(|w| -> XmlResult<()> {
        w.create_element("a:xfrm").write_inner_content(|w| -> XmlResult<()> {
            empty(w, "a:off", &[("x", "0"), ("y", "0")])?;
            empty(w, "a:ext", &[("cx", "0"), ("cy", "0")])?;
            empty(w, "a:chOff", &[("x", "0"), ("y", "0")])?;
            empty(w, "a:chExt", &[("cx", "0"), ("cy", "0")])
        })?;
        Ok(())
    })?;
    Ok(())
}

// Non-visual properties shared by every shape kind
fn write_nv_props(w: &mut XmlWriter, wrapper: &str, id: u32, name: &str, inner: impl FnOnce(&mut XmlWriter) -> XmlResult<()>) -> XmlResult<()> {
    let id = id.to_string();
    w.create_element(wrapper).write_inner_content(|w| -> XmlResult<()> {
        empty(w, "p:cNvPr", &[("id", id.as_str()), ("name", name)])?;
        inner(w)?;
        empty(w, "p:nvPr", &[])
    })?;
    Ok(())
}

/// One drawable element of a slide.
#[derive(Debug, Clone)]
enum Shape {
    Geometry {
        id: u32,
        preset: &'static str,
        at: Rect,
        fill: Option<(Rgb, f64)>,
        outline: Outline,
    },
    TextBox {
        id: u32,
        at: Rect,
        paragraphs: Vec<(String, TextStyle)>,
    },
    Picture {
        id: u32,
        at: Rect,
        rel_id: String,
    },
}

impl Shape {
    fn write(&self, w: &mut XmlWriter) -> XmlResult<()> {
        match self {
            Shape::Geometry { id, preset, at, fill, outline } => {
                w.create_element("p:sp").write_inner_content(|w| -> XmlResult<()> {
                    write_nv_props(w, "p:nvSpPr", *id, &format!("Shape {}", id), |w| empty(w, "p:cNvSpPr", &[]))?;
                    w.create_element("p:spPr").write_inner_content(|w| -> XmlResult<()> {
                        write_xfrm(w, at)?;
                        write_preset(w, preset)?;
                        match fill {
                            Some((color, transparency)) => write_solid_fill(w, *color, *transparency)?,
                            None => write_no_fill(w)?,
                        }
                        write_outline(w, *outline)
                    })?;
                    Ok(())
                })?;
            }
            Shape::TextBox { id, at, paragraphs } => {
                w.create_element("p:sp").write_inner_content(|w| -> XmlResult<()> {
                    write_nv_props(w, "p:nvSpPr", *id, &format!("TextBox {}", id), |w| {
                        empty(w, "p:cNvSpPr", &[("txBox", "1")])
                    })?;
                    w.create_element("p:spPr").write_inner_content(|w| -> XmlResult<()> {
                        write_xfrm(w, at)?;
                        write_preset(w, "rect")?;
                        write_no_fill(w)
                    })?;
                    w.create_element("p:txBody").write_inner_content(|w| -> XmlResult<()> {
                        w.create_element("a:bodyPr")
                            .with_attributes([("wrap", "square"), ("rtlCol", "0")])
                            .write_inner_content(|w| -> XmlResult<()> { empty(w, "a:normAutofit", &[]) })?;
                        empty(w, "a:lstStyle", &[])?;
                        for (text, style) in paragraphs {
                            write_paragraph(w, text, style)?;
                        }
                        Ok(())
                    })?;
                    Ok(())
                })?;
            }
            Shape::Picture { id, at, rel_id } => {
                w.create_element("p:pic").write_inner_content(|w| -> XmlResult<()> {
                    write_nv_props(w, "p:nvPicPr", *id, &format!("Picture {}", id), |w| {
                        w.create_element("p:cNvPicPr").write_inner_content(|w| -> XmlResult<()> {
                            empty(w, "a:picLocks", &[("noChangeAspect", "1")])
                        })?;
                        Ok(())
                    })?;
                    w.create_element("p:blipFill").write_inner_content(|w| -> XmlResult<()> {
                        empty(w, "a:blip", &[("r:embed", rel_id.as_str())])?;
                        w.create_element("a:stretch")
                            .write_inner_content(|w| -> XmlResult<()> { empty(w, "a:fillRect", &[]) })?;
                        Ok(())
                    })?;
                    w.create_element("p:spPr").write_inner_content(|w| -> XmlResult<()> {
                        write_xfrm(w, at)?;
                        write_preset(w, "rect")
                    })?;
                    Ok(())
                })?;
            }
        }
        Ok(())
    }
}

/// Shapes and relationships of one slide under construction.
struct SlideCanvas {
    background: Option<(Rgb, Rgb)>,
    shapes: Vec<Shape>,
    next_id: u32,
    // (relationship id, media file name)
    images: Vec<(String, String)>,
}

impl SlideCanvas {
    fn new() -> Self {
        Self {
            background: None,
            shapes: Vec::new(),
            next_id: 2,
            images: Vec::new(),
        }
    }

    fn take_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn gradient_background(&mut self, from: Rgb, to: Rgb) {
        self.background = Some((from, to));
    }

    fn add_shape(&mut self, preset: &'static str, at: Rect, fill: Option<(Rgb, f64)>, outline: Outline) {
        let id = self.take_id();
        self.shapes.push(Shape::Geometry { id, preset, at, fill, outline });
    }

    fn add_rect(&mut self, at: Rect, fill: Rgb, outline: Outline) {
        self.add_shape("rect", at, Some((fill, 0.0)), outline);
    }

    fn add_text(&mut self, at: Rect, text: &str, style: TextStyle) {
        let paragraphs: Vec<(&str, TextStyle)> = text.split('\n').map(|line| (line, style)).collect();
        self.add_paragraphs(at, &paragraphs);
    }

    fn add_paragraphs(&mut self, at: Rect, paragraphs: &[(&str, TextStyle)]) {
        let id = self.take_id();
        let paragraphs = paragraphs
            .iter()
            .map(|(text, style)| (text.to_string(), *style))
            .collect();
        self.shapes.push(Shape::TextBox { id, at, paragraphs });
    }

    fn add_picture(&mut self, at: Rect, media_name: String) {
        let id = self.take_id();
        let rel_id = format!("rId{}", self.images.len() + 2);
        self.shapes.push(Shape::Picture {
            id,
            at,
            rel_id: rel_id.clone(),
        });
        self.images.push((rel_id, media_name));
    }

    fn to_xml(&self) -> XmlResult<Vec<u8>> {
        let mut w = Writer::new(Vec::new());
        write_decl(&mut w)?;
        w.create_element("p:sld")
            .with_attributes([("xmlns:a", NS_A), ("xmlns:r", NS_R), ("xmlns:p", NS_P)])
            .write_inner_content(|w| -> XmlResult<()> {
                w.create_element("p:cSld").write_inner_content(|w| -> XmlResult<()> {
                    if let Some((from, to)) = self.background {
                        write_gradient_background(w, from, to)?;
                    }
                    w.create_element("p:spTree").write_inner_content(|w| -> XmlResult<()> {
                        write_group_header(w)?;
                        for shape in &self.shapes {
                            shape.write(w)?;
                        }
                        Ok(())
                    })?;
                    Ok(())
                })?;
                w.create_element("p:clrMapOvr")
                    .write_inner_content(|w| -> XmlResult<()> { empty(w, "a:masterClrMapping", &[]) })?;
                Ok(())
            })?;
        Ok(w.into_inner())
    }

    fn rels_xml(&self) -> String {
        let mut rels = vec![relationship(
            "rId1",
            "slideLayout",
            "../slideLayouts/slideLayout1.xml",
        )];
        for (rel_id, media_name) in &self.images {
            rels.push(relationship(rel_id, "image", &format!("../media/{}", media_name)));
        }
        relationships_xml(&rels)
    }
}

fn write_gradient_background(w: &mut XmlWriter, from: Rgb, to: Rgb) -> XmlResult<()> {
    let stops = [("0", from.hex()), ("100000", to.hex())];
    w.create_element("p:bg").write_inner_content(|w| -> XmlResult<()> {
        w.create_element("p:bgPr").write_inner_content(|w| -> XmlResult<()> {
            w.create_element("a:gradFill")
                .with_attribute(("rotWithShape", "1"))
                .write_inner_content(|w| -> XmlResult<()> {
                    w.create_element("a:gsLst").write_inner_content(|w| -> XmlResult<()> {
                        for (pos, hex) in &stops {
                            w.create_element("a:gs")
                                .with_attribute(("pos", *pos))
                                .write_inner_content(|w| -> XmlResult<()> { empty(w, "a:srgbClr", &[("val", hex.as_str())]) })?;
                        }
                        Ok(())
                    })?;
                    empty(w, "a:lin", &[("ang", "5400000"), ("scaled", "0")])
                })?;
            empty(w, "a:effectLst", &[])
        })?;
        Ok(())
    })?;
    Ok(())
}

// Package plumbing below carries no user text
fn relationship(id: &str, kind: &str, target: &str) -> String {
    format!(r#"<Relationship Id="{id}" Type="{REL_BASE}/{kind}" Target="{target}"/>"#)
}

fn relationships_xml(rels: &[String]) -> String {
    format!(r#"{XML_DECL}<Relationships xmlns="{NS_RELS}">{}</Relationships>"#, rels.concat())
}

fn group_header() -> &'static str {
    r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#
}

/// What the cover slide shows.
#[derive(Debug, Clone)]
pub struct CoverInfo {
    pub asana: String,
    pub student_name: String,
}

/// Renders decks with one palette.
pub struct DeckWriter<'a> {
    palette: &'a Palette,
    display_title_len: usize,
    created: DateTime<Local>,
}

impl<'a> DeckWriter<'a> {
    pub fn new(palette: &'a Palette, display_title_len: usize) -> Self {
        Self {
            palette,
            display_title_len,
            created: Local::now(),
        }
    }

    pub fn created_at(mut self, created: DateTime<Local>) -> Self {
        self.created = created;
        self
    }

    /// Write the cover plus one slide per record.
    ///
    /// `images[i]` holds the downloaded bytes of slide `i`'s image, if any.
    pub fn write(&self, cover: &CoverInfo, slides: &[SlideRecord], images: &[Option<Vec<u8>>]) -> DeckResult<Vec<u8>> {
        let mut canvases = vec![self.cover_slide(cover)];
        let mut media: Vec<(String, ImageFormat, &[u8])> = Vec::new();

        for (index, slide) in slides.iter().enumerate() {
            let image = images.get(index).and_then(Option::as_deref);
            canvases.push(self.content_slide(index, slide, image, &mut media));
        }

        let mut parts: Vec<(String, Vec<u8>)> = vec![
            ("[Content_Types].xml".to_string(), content_types_xml(canvases.len(), &media).into_bytes()),
            ("_rels/.rels".to_string(), package_rels_xml().into_bytes()),
            ("docProps/core.xml".to_string(), self.core_props_xml(cover)?),
            ("docProps/app.xml".to_string(), app_props_xml(canvases.len()).into_bytes()),
            ("ppt/presentation.xml".to_string(), presentation_xml(canvases.len()).into_bytes()),
            ("ppt/_rels/presentation.xml.rels".to_string(), presentation_rels_xml(canvases.len()).into_bytes()),
            ("ppt/presProps.xml".to_string(), pres_props_xml().into_bytes()),
            ("ppt/tableStyles.xml".to_string(), table_styles_xml().into_bytes()),
            ("ppt/slideMasters/slideMaster1.xml".to_string(), slide_master_xml().into_bytes()),
            (
                "ppt/slideMasters/_rels/slideMaster1.xml.rels".to_string(),
                relationships_xml(&[
                    relationship("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
                    relationship("rId2", "theme", "../theme/theme1.xml"),
                ])
                .into_bytes(),
            ),
            ("ppt/slideLayouts/slideLayout1.xml".to_string(), slide_layout_xml().into_bytes()),
            (
                "ppt/slideLayouts/_rels/slideLayout1.xml.rels".to_string(),
                relationships_xml(&[relationship("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")])
                    .into_bytes(),
            ),
            ("ppt/theme/theme1.xml".to_string(), theme_xml(self.palette).into_bytes()),
        ];

        for (index, canvas) in canvases.iter().enumerate() {
            let number = index + 1;
            parts.push((format!("ppt/slides/slide{}.xml", number), canvas.to_xml()?));
            parts.push((format!("ppt/slides/_rels/slide{}.xml.rels", number), canvas.rels_xml().into_bytes()));
        }
        for (name, _, bytes) in &media {
            parts.push((format!("ppt/media/{}", name), bytes.to_vec()));
        }

        let bytes = write_package(&parts)?;
        debug!(
            "Rendered deck for {} with {} slides and {} images ({} bytes, palette {})",
            cover.asana,
            canvases.len(),
            media.len(),
            bytes.len(),
            self.palette.name
        );
        Ok(bytes)
    }

    fn decorate(&self, canvas: &mut SlideCanvas, slide_number: usize) {
        let colors = self.palette;
        canvas.gradient_background(colors.light_bg, GRADIENT_END);
        canvas.add_rect(rect(0.0, 0.0, SLIDE_WIDTH_IN, SLIDE_HEIGHT_IN), colors.light_bg, Outline::None);

        let count = 6 + slide_number % 5;
        for (k, &(left, top)) in CIRCLE_POSITIONS.iter().take(count).enumerate() {
            let size = 0.2 + k as f64 * 0.05;
            let color = match k % 3 {
                0 => colors.accent,
                1 => colors.highlight,
                _ => colors.secondary,
            };
            let transparency = 0.6 + k as f64 * 0.03;
            canvas.add_shape("ellipse", rect(left, top, size, size), Some((color, transparency)), Outline::None);
        }
    }

    fn cover_slide(&self, cover: &CoverInfo) -> SlideCanvas {
        let colors = self.palette;
        let mut canvas = SlideCanvas::new();
        self.decorate(&mut canvas, 0);

        canvas.add_text(
            rect(1.0, 1.8, 11.3, 1.5),
            &cover.asana.to_uppercase(),
            TextStyle::new(58.0, colors.primary).bold().font("Arial Black").centered(),
        );

        let mut subtitle = "COMPREHENSIVE YOGA PRACTICE GUIDE".to_string();
        if !cover.student_name.is_empty() {
            subtitle.push_str(&format!(" • PERSONALIZED FOR {}", cover.student_name.to_uppercase()));
        }
        canvas.add_text(
            rect(1.0, 3.6, 11.3, 1.0),
            &subtitle,
            TextStyle::new(24.0, colors.secondary).bold().centered(),
        );

        canvas.add_rect(rect(4.5, 4.8, 4.3, 0.15), colors.accent, Outline::None);

        let date_line = format!(
            "CREATED • {} • COMPREHENSIVE 13-SLIDE GUIDE",
            self.created.format("%B %d, %Y").to_string().to_uppercase()
        );
        canvas.add_text(
            rect(1.0, 5.2, 11.3, 0.6),
            &date_line,
            TextStyle::new(16.0, colors.text).italic().centered(),
        );

        canvas
    }

    fn content_slide<'m>(
        &self,
        index: usize,
        slide: &SlideRecord,
        image: Option<&'m [u8]>,
        media: &mut Vec<(String, ImageFormat, &'m [u8])>,
    ) -> SlideCanvas {
        let colors = self.palette;
        let mut canvas = SlideCanvas::new();
        self.decorate(&mut canvas, index);

        canvas.add_rect(rect(0.5, 0.2, 12.3, 0.9), colors.primary, Outline::None);
        canvas.add_text(
            rect(11.5, 0.3, 1.2, 0.5),
            &format!("SLIDE {:02}", index + 1),
            TextStyle::new(18.0, Rgb::WHITE).bold().font("Arial Black"),
        );
        canvas.add_text(
            rect(0.8, 0.3, 8.0, 0.7),
            &slide.display_title(self.display_title_len),
            TextStyle::new(22.0, Rgb::WHITE).bold(),
        );

        canvas.add_rect(
            rect(0.8, 1.3, 6.5, 5.2),
            Rgb::WHITE,
            Outline::Solid { color: colors.primary, width_pt: 2.5 },
        );

        let mut content_top = 1.5;
        if !slide.subheading.is_empty() {
            canvas.add_text(
                rect(1.0, content_top, 6.0, 0.7),
                &slide.subheading,
                TextStyle::new(16.0, colors.secondary).bold(),
            );
            content_top += 0.8;
        }

        let bullets: Vec<(&str, TextStyle)> = slide
            .bullets
            .iter()
            .enumerate()
            .map(|(j, bullet)| {
                let style = match j {
                    0 => TextStyle::new(13.0, colors.text),
                    j if j % 2 == 0 => TextStyle::new(12.0, colors.secondary),
                    _ => TextStyle::new(12.0, colors.text),
                };
                (bullet.as_str(), style)
            })
            .collect();
        canvas.add_paragraphs(rect(1.0, content_top, 6.0, 4.5), &bullets);

        if let Some(bytes) = image {
            match ImageFormat::sniff(bytes) {
                Some(format) => {
                    canvas.add_rect(
                        rect(7.8, 1.3, 4.4, 4.2),
                        Rgb::WHITE,
                        Outline::Solid { color: colors.accent, width_pt: 3.5 },
                    );
                    let media_name = format!("image{}.{}", media.len() + 1, format.extension());
                    canvas.add_picture(rect(8.0, 1.5, 4.0, 3.6), media_name.clone());
                    media.push((media_name, format, bytes));

                    let photographer = slide
                        .image
                        .as_ref()
                        .map(|image| image.photographer.as_str())
                        .unwrap_or_default();
                    canvas.add_text(
                        rect(7.8, 5.6, 4.4, 0.4),
                        &format!("📸 PROFESSIONAL IMAGE • {}", photographer),
                        TextStyle::new(10.0, colors.text).italic().centered(),
                    );
                }
                None => {
                    debug!("Slide {} image is not a PNG, JPEG or GIF, using placeholder", index + 1);
                    canvas.add_rect(rect(7.8, 1.3, 4.4, 4.2), colors.highlight, Outline::None);

                    let tail = match slide.subheading.rsplit_once(':') {
                        Some((_, tail)) => tail,
                        None => "Professional Yoga Practice",
                    };
                    canvas.add_text(
                        rect(7.8, 2.8, 4.4, 1.5),
                        &format!("🎨\nVISUAL INSPIRATION\n{}\nComprehensive Guidance", tail),
                        TextStyle::new(16.0, Rgb::WHITE).bold().centered(),
                    );
                }
            }
        }

        canvas.add_rect(rect(0.5, 6.7, 12.3, 0.15), colors.accent, Outline::None);
        canvas
    }

    fn core_props_xml(&self, cover: &CoverInfo) -> XmlResult<Vec<u8>> {
        let title = clean_text(&format!("{} - Comprehensive Yoga Guide", cover.asana));
        let created = self.created.naive_utc().format("%Y-%m-%dT%H:%M:%SZ").to_string();

        let mut w = Writer::new(Vec::new());
        write_decl(&mut w)?;
        w.create_element("cp:coreProperties")
            .with_attributes([
                ("xmlns:cp", "http://schemas.openxmlformats.org/package/2006/metadata/core-properties"),
                ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
                ("xmlns:dcterms", "http://purl.org/dc/terms/"),
                ("xmlns:xsi", "http://www.w3.org/2001/XMLSchema-instance"),
            ])
            .write_inner_content(|w| -> XmlResult<()> {
                w.create_element("dc:title").write_text_content(BytesText::new(&title))?;
                w.create_element("dc:creator").write_text_content(BytesText::new("asana-deck"))?;
                w.create_element("dcterms:created")
                    .with_attribute(("xsi:type", "dcterms:W3CDTF"))
                    .write_text_content(BytesText::new(&created))?;
                Ok(())
            })?;
        Ok(w.into_inner())
    }
}

fn write_package(parts: &[(String, Vec<u8>)]) -> DeckResult<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, data) in parts {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(data)?;
    }

    Ok(zip.finish()?.into_inner())
}

fn content_types_xml(slide_count: usize, media: &[(String, ImageFormat, &[u8])]) -> String {
    let mut defaults = vec![
        r#"<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>"#.to_string(),
        r#"<Default Extension="xml" ContentType="application/xml"/>"#.to_string(),
    ];
    let mut seen: Vec<ImageFormat> = Vec::new();
    for (_, format, _) in media {
        if !seen.contains(format) {
            seen.push(*format);
            defaults.push(format!(
                r#"<Default Extension="{}" ContentType="{}"/>"#,
                format.extension(),
                format.content_type()
            ));
        }
    }

    let mut overrides = vec![
        format!(r#"<Override PartName="/ppt/presentation.xml" ContentType="{CT_BASE}.presentationml.presentation.main+xml"/>"#),
        format!(r#"<Override PartName="/ppt/presProps.xml" ContentType="{CT_BASE}.presentationml.presProps+xml"/>"#),
        format!(r#"<Override PartName="/ppt/tableStyles.xml" ContentType="{CT_BASE}.presentationml.tableStyles+xml"/>"#),
        format!(r#"<Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="{CT_BASE}.presentationml.slideMaster+xml"/>"#),
        format!(r#"<Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="{CT_BASE}.presentationml.slideLayout+xml"/>"#),
        format!(r#"<Override PartName="/ppt/theme/theme1.xml" ContentType="{CT_BASE}.theme+xml"/>"#),
        r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>"#.to_string(),
        format!(r#"<Override PartName="/docProps/app.xml" ContentType="{CT_BASE}.extended-properties+xml"/>"#),
    ];
    for number in 1..=slide_count {
        overrides.push(format!(
            r#"<Override PartName="/ppt/slides/slide{number}.xml" ContentType="{CT_BASE}.presentationml.slide+xml"/>"#
        ));
    }

    format!(
        r#"{XML_DECL}<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">{}{}</Types>"#,
        defaults.concat(),
        overrides.concat()
    )
}

fn package_rels_xml() -> String {
    relationships_xml(&[
        relationship("rId1", "officeDocument", "ppt/presentation.xml"),
        r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>"#
            .to_string(),
        relationship("rId3", "extended-properties", "docProps/app.xml"),
    ])
}

fn app_props_xml(slide_count: usize) -> String {
    format!(
        r#"{XML_DECL}<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties"><Application>asana-deck</Application><Slides>{slide_count}</Slides></Properties>"#
    )
}

// Relationship ids: rId1 master, rId2 theme, rId3 presProps, rId4 tableStyles, then slides
fn presentation_xml(slide_count: usize) -> String {
    let slide_ids: String = (0..slide_count)
        .map(|i| format!(r#"<p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 5))
        .collect();
    format!(
        r#"{XML_DECL}<p:presentation xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" saveSubsetFonts="1"><p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst><p:sldIdLst>{slide_ids}</p:sldIdLst><p:sldSz cx="{}" cy="{}"/><p:notesSz cx="6858000" cy="9144000"/></p:presentation>"#,
        emu(SLIDE_WIDTH_IN),
        emu(SLIDE_HEIGHT_IN)
    )
}

fn presentation_rels_xml(slide_count: usize) -> String {
    let mut rels = vec![
        relationship("rId1", "slideMaster", "slideMasters/slideMaster1.xml"),
        relationship("rId2", "theme", "theme/theme1.xml"),
        relationship("rId3", "presProps", "presProps.xml"),
        relationship("rId4", "tableStyles", "tableStyles.xml"),
    ];
    for i in 0..slide_count {
        rels.push(relationship(&format!("rId{}", i + 5), "slide", &format!("slides/slide{}.xml", i + 1)));
    }
    relationships_xml(&rels)
}

fn pres_props_xml() -> String {
    format!(r#"{XML_DECL}<p:presentationPr xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"/>"#)
}

fn table_styles_xml() -> String {
    format!(r#"{XML_DECL}<a:tblStyleLst xmlns:a="{NS_A}" def="{{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}}"/>"#)
}

fn slide_master_xml() -> String {
    format!(
        r#"{XML_DECL}<p:sldMaster xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}"><p:cSld><p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg><p:spTree>{}</p:spTree></p:cSld><p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/><p:sldLayoutIdLst><p:sldLayoutId id="2147483649" r:id="rId1"/></p:sldLayoutIdLst><p:txStyles><p:titleStyle/><p:bodyStyle/><p:otherStyle/></p:txStyles></p:sldMaster>"#,
        group_header()
    )
}

fn slide_layout_xml() -> String {
    format!(
        r#"{XML_DECL}<p:sldLayout xmlns:a="{NS_A}" xmlns:r="{NS_R}" xmlns:p="{NS_P}" type="blank" preserve="1"><p:cSld name="Blank"><p:spTree>{}</p:spTree></p:cSld><p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr></p:sldLayout>"#,
        group_header()
    )
}

// Minimal theme whose accents follow the deck palette
fn theme_xml(palette: &Palette) -> String {
    let color = |name: &str, rgb: Rgb| format!(r#"<a:{name}><a:srgbClr val="{}"/></a:{name}>"#, rgb.hex());
    let colors = [
        color("dk1", palette.text),
        color("lt1", Rgb::WHITE),
        color("dk2", palette.primary),
        color("lt2", palette.light_bg),
        color("accent1", palette.primary),
        color("accent2", palette.secondary),
        color("accent3", palette.accent),
        color("accent4", palette.highlight),
        color("accent5", palette.success),
        color("accent6", palette.warning),
        color("hlink", palette.primary),
        color("folHlink", palette.highlight),
    ]
    .concat();

    let fonts = r#"<a:majorFont><a:latin typeface="Arial Black"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont><a:minorFont><a:latin typeface="Arial"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>"#;
    let fill = r#"<a:solidFill><a:schemeClr val="phClr"/></a:solidFill>"#;
    let line = r#"<a:ln w="9525"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>"#;
    let effect = "<a:effectStyle><a:effectLst/></a:effectStyle>";

    format!(
        r#"{XML_DECL}<a:theme xmlns:a="{NS_A}" name="{}"><a:themeElements><a:clrScheme name="{}">{colors}</a:clrScheme><a:fontScheme name="Deck">{fonts}</a:fontScheme><a:fmtScheme name="Deck"><a:fillStyleLst>{fill}{fill}{fill}</a:fillStyleLst><a:lnStyleLst>{line}{line}{line}</a:lnStyleLst><a:effectStyleLst>{effect}{effect}{effect}</a:effectStyleLst><a:bgFillStyleLst>{fill}{fill}{fill}</a:bgFillStyleLst></a:fmtScheme></a:themeElements></a:theme>"#,
        palette.name, palette.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck_theme::PALETTES;
    use crate::models::SlideImage;
    use crate::slide_normalizer::SlideRules;
    use chrono::TimeZone;
    use std::io::Read;
    use zip::ZipArchive;

    const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

    fn read_part(bytes: &[u8], name: &str) -> String {
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut file = archive.by_name(name).unwrap();
        let mut content = String::new();
        file.read_to_string(&mut content).unwrap();
        content
    }

    fn sample_slides(count: usize) -> Vec<SlideRecord> {
        let rules = SlideRules::default();
        (0..count)
            .map(|i| {
                SlideRecord::from_body(
                    &format!("SLIDE {}: TOPIC & <MORE>\n💪 SUBHEADING: Strength\n• First\n• Second", i + 1),
                    &rules,
                )
            })
            .collect()
    }

    fn cover() -> CoverInfo {
        CoverInfo {
            asana: "Tadasana".to_string(),
            student_name: "Mira Sen".to_string(),
        }
    }

    #[test]
    fn test_sniff_image_format() {
        assert_eq!(ImageFormat::sniff(PNG_BYTES), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::sniff(b"GIF89a"), Some(ImageFormat::Gif));
        assert_eq!(ImageFormat::sniff(b"<html>"), None);
        assert_eq!(ImageFormat::Png.content_type(), "image/png");
    }

    #[test]
    fn test_clean_text_strips_controls() {
        assert_eq!(clean_text("bell\u{7}"), "bell");
        assert_eq!(clean_text("tab\tkept"), "tab\tkept");
    }

    #[test]
    fn test_deck_has_cover_plus_one_slide_per_record() {
        let writer = DeckWriter::new(&PALETTES[0], 45);
        let bytes = writer.write(&cover(), &sample_slides(13), &[]).unwrap();

        let archive = ZipArchive::new(Cursor::new(bytes.as_slice())).unwrap();
        let slide_parts = archive
            .file_names()
            .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
            .count();
        assert_eq!(slide_parts, 14);

        let presentation = read_part(&bytes, "ppt/presentation.xml");
        assert_eq!(presentation.matches("<p:sldId ").count(), 14);
        assert!(presentation.contains(r#"cx="12191695""#));

        let content_types = read_part(&bytes, "[Content_Types].xml");
        assert!(content_types.contains("/ppt/slides/slide14.xml"));
    }

    #[test]
    fn test_cover_text() {
        let created = Local.with_ymd_and_hms(2025, 3, 7, 9, 30, 0).unwrap();
        let writer = DeckWriter::new(&PALETTES[1], 45).created_at(created);
        let bytes = writer.write(&cover(), &sample_slides(1), &[]).unwrap();

        let cover_xml = read_part(&bytes, "ppt/slides/slide1.xml");
        assert!(cover_xml.contains("<a:t>TADASANA</a:t>"));
        assert!(cover_xml.contains("COMPREHENSIVE YOGA PRACTICE GUIDE • PERSONALIZED FOR MIRA SEN"));
        assert!(cover_xml.contains("CREATED • MARCH 07, 2025 • COMPREHENSIVE 13-SLIDE GUIDE"));
        assert!(cover_xml.contains(&PALETTES[1].primary.hex()));
    }

    #[test]
    fn test_content_slide_text_is_escaped_and_numbered() {
        let writer = DeckWriter::new(&PALETTES[0], 45);
        let bytes = writer.write(&cover(), &sample_slides(2), &[]).unwrap();

        let slide = read_part(&bytes, "ppt/slides/slide3.xml");
        assert!(slide.contains("<a:t>SLIDE 02</a:t>"));
        assert!(slide.contains("SLIDE 2: TOPIC &amp; &lt;MORE&gt;"));
        assert!(slide.contains("<a:t>• Second</a:t>"));
        assert!(slide.contains("Additional detailed point for comprehensive coverage"));
        // 6 + 1 % 5 decorative circles
        assert_eq!(slide.matches(r#"prst="ellipse""#).count(), 7);
    }

    #[test]
    fn test_long_titles_are_shortened_in_header() {
        let rules = SlideRules::default();
        let long_title = format!("SLIDE 1: {}", "W".repeat(60));
        let slides = vec![SlideRecord::from_body(&long_title, &rules)];

        let bytes = DeckWriter::new(&PALETTES[0], 45).write(&cover(), &slides, &[]).unwrap();
        let slide = read_part(&bytes, "ppt/slides/slide2.xml");

        let shown: String = long_title.chars().take(45).collect();
        assert!(slide.contains(&format!("<a:t>{}...</a:t>", shown)));
    }

    #[test]
    fn test_images_embedded_or_replaced_by_placeholder() {
        let mut slides = sample_slides(3);
        for slide in slides.iter_mut() {
            slide.image = Some(SlideImage {
                url: "https://img.test/x".to_string(),
                alt: String::new(),
                photographer: "Ana Lens".to_string(),
                source: "unsplash".to_string(),
            });
        }
        let images = vec![Some(PNG_BYTES.to_vec()), Some(b"not an image".to_vec()), None];

        let bytes = DeckWriter::new(&PALETTES[0], 45).write(&cover(), &slides, &images).unwrap();

        let first = read_part(&bytes, "ppt/slides/slide2.xml");
        assert!(first.contains(r#"r:embed="rId2""#));
        assert!(first.contains("📸 PROFESSIONAL IMAGE • Ana Lens"));
        let first_rels = read_part(&bytes, "ppt/slides/_rels/slide2.xml.rels");
        assert!(first_rels.contains("../media/image1.png"));
        assert_eq!(read_part(&bytes, "[Content_Types].xml").matches(r#"Extension="png""#).count(), 1);

        let second = read_part(&bytes, "ppt/slides/slide3.xml");
        assert!(!second.contains("<p:pic>"));
        assert!(second.contains("VISUAL INSPIRATION"));
        assert!(second.contains("<a:t> Strength</a:t>"));

        let third = read_part(&bytes, "ppt/slides/slide4.xml");
        assert!(!third.contains("<p:pic>"));
        assert!(!third.contains("VISUAL INSPIRATION"));
    }

    fn assert_well_formed(xml: &str) {
        let mut reader = quick_xml::Reader::from_str(xml);
        loop {
            match reader.read_event() {
                Ok(quick_xml::events::Event::Eof) => break,
                Ok(_) => {}
                Err(e) => panic!("malformed XML at {}: {}", reader.buffer_position(), e),
            }
        }
    }

    #[test]
    fn test_markup_in_user_text_keeps_parts_well_formed() {
        let rules = SlideRules::default();
        let hostile = CoverInfo {
            asana: r#"Tadasana "Mountain" & <Co>"#.to_string(),
            student_name: "O'Neil <b>".to_string(),
        };
        let mut slides = vec![SlideRecord::from_body(
            "SLIDE 1: \"QUOTED\" & 'APOS' </a:t>\n🎯 SUBHEADING: a<b\n• x > y & z",
            &rules,
        )];
        slides[0].image = Some(SlideImage {
            url: "https://img.test/x".to_string(),
            alt: String::new(),
            photographer: r#"Ana "Lens" & Co"#.to_string(),
            source: "unsplash".to_string(),
        });

        let bytes = DeckWriter::new(&PALETTES[0], 45)
            .write(&hostile, &slides, &[Some(PNG_BYTES.to_vec())])
            .unwrap();

        for part in ["docProps/core.xml", "ppt/slides/slide1.xml", "ppt/slides/slide2.xml"] {
            assert_well_formed(&read_part(&bytes, part));
        }
        let core = read_part(&bytes, "docProps/core.xml");
        assert!(core.contains("Tadasana &quot;Mountain&quot; &amp; &lt;Co&gt; - Comprehensive Yoga Guide"));
        let cover = read_part(&bytes, "ppt/slides/slide1.xml");
        assert!(cover.contains("PERSONALIZED FOR O&apos;NEIL &lt;B&gt;"));
        let slide = read_part(&bytes, "ppt/slides/slide2.xml");
        assert!(slide.contains("&lt;/a:t&gt;"));
        assert!(slide.contains("Ana &quot;Lens&quot; &amp; Co"));
    }
}
