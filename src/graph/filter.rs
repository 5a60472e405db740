use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::assets::store::AssetPaths;
use crate::foundation::core::{Fps, Size};
use crate::foundation::error::{LayerfadeError, LayerfadeResult};
use crate::render::geometry::CanvasGeometry;
use crate::timing::config::TimingConfig;

/// What an input stream of the graph carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputRole {
    Background,
    Layer(usize),
    Outro,
    Overlay,
}

/// One still image fed to ffmpeg as a looping input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GraphInput {
    pub role: InputRole,
    pub path: PathBuf,
}

/// A complete `filter_complex` description of a job.
///
/// Compositing happens inside ffmpeg; opacity is driven per output frame by `geq` expressions
/// over the frame number `N`, encoding the same ramps as [`TimingConfig::opacity`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterGraph {
    inputs: Vec<GraphInput>,
    chains: Vec<String>,
    output_label: String,
    canvas: Size,
    fps: Fps,
    total_frames: u64,
}

impl FilterGraph {
    /// Inputs in ffmpeg `-i` order; the position is the stream index used in the chains.
    pub fn inputs(&self) -> &[GraphInput] {
        &self.inputs
    }

    /// Individual filter chains.
    pub fn chains(&self) -> &[String] {
        &self.chains
    }

    /// The full `-filter_complex` argument.
    pub fn filter_complex(&self) -> String {
        self.chains.join(";")
    }

    /// Label of the final stream, including brackets, for `-map`.
    pub fn output_label(&self) -> &str {
        &self.output_label
    }

    pub fn canvas(&self) -> Size {
        self.canvas
    }

    pub fn fps(&self) -> Fps {
        self.fps
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Arguments for an `ffmpeg` invocation that renders the graph to `out_path`.
    ///
    /// Output is h264/yuv420p; the caller decides about `-y` and log level.
    pub fn ffmpeg_args(&self, out_path: &Path) -> Vec<OsString> {
        let rate = format!("{}/{}", self.fps.num, self.fps.den);
        let mut args: Vec<OsString> = Vec::new();
        for input in &self.inputs {
            args.extend(["-loop", "1", "-framerate", rate.as_str(), "-i"].map(OsString::from));
            args.push(input.path.clone().into_os_string());
        }
        args.extend(
            [
                "-filter_complex".to_owned(),
                self.filter_complex(),
                "-map".to_owned(),
                self.output_label.clone(),
                "-frames:v".to_owned(),
                self.total_frames.to_string(),
                "-r".to_owned(),
                rate,
                "-c:v".to_owned(),
                "libx264".to_owned(),
                "-pix_fmt".to_owned(),
                "yuv420p".to_owned(),
                "-movflags".to_owned(),
                "+faststart".to_owned(),
                "-f".to_owned(),
                "mp4".to_owned(),
            ]
            .map(OsString::from),
        );
        args.push(out_path.as_os_str().to_owned());
        args
    }
}

/// Opacity of a layer whose fade starts at zero-based frame `start` and lasts `fade` frames.
///
/// 0 before the start, `trunc(255 * (N - start) / fade)` during the fade, 255 afterwards.
pub fn layer_opacity_expr(start: u64, fade: u64) -> String {
    format!(
        "if(lt(N,{start}),0,if(lt(N,{end}),trunc(255*(N-{start})/{fade}),255))",
        end = start + fade
    )
}

/// Opacity of the outro at zero-based outro frame `N`: `round(255 * (N + 1) / fade)`, halves up.
pub fn outro_opacity_expr(fade: u64) -> String {
    format!("min(floor(255*(N+1)/{fade}+0.5),255)")
}

/// Chains that put stream `[input]` over an opaque `bg_rgba` canvas, ending at `[flat]`.
///
/// yuv420p has no alpha, so straight-alpha pixels must be composited before conversion or
/// their fade is lost. The background alpha is ignored.
pub fn flatten_chains(input: &str, bg_rgba: [u8; 4], canvas: Size, fps: Fps) -> [String; 2] {
    let [r, g, b, _] = bg_rgba;
    [
        format!(
            "color=c=0x{r:02x}{g:02x}{b:02x}:s={w}x{h}:r={num}/{den}[matte]",
            w = canvas.width,
            h = canvas.height,
            num = fps.num,
            den = fps.den,
        ),
        format!("[matte][{input}]overlay=format=auto:shortest=1[flat]"),
    ]
}

fn clamp_alpha(opacity: &str) -> String {
    format!("geq=r='r(X,Y)':g='g(X,Y)':b='b(X,Y)':a='min(alpha(X,Y),{opacity})'")
}

/// Describe the whole job as one ffmpeg filter graph.
///
/// Layers that have not started have opacity 0 and therefore leave the composite unchanged,
/// the same outcome as skipping them. The outro segment starts from a transparent base and is
/// concatenated after the layer sequence; the overlay, when used, pads the result to the
/// canvas and is drawn on top. The composite is finally flattened over `bg_rgba`.
#[tracing::instrument(skip_all, fields(layers = timing.layer_count()))]
pub fn build_filter_graph(
    timing: &TimingConfig,
    paths: &AssetPaths,
    geometry: &CanvasGeometry,
    bg_rgba: [u8; 4],
) -> LayerfadeResult<FilterGraph> {
    if paths.layers.len() != timing.layer_count() {
        return Err(LayerfadeError::configuration(format!(
            "timing is for {} layers but {} layer paths were given",
            timing.layer_count(),
            paths.layers.len()
        )));
    }
    let overlay_path = match (&paths.overlay, geometry.overlay) {
        (Some(p), true) => Some(p.clone()),
        (None, true) => {
            return Err(LayerfadeError::geometry(
                "geometry expects an overlay but no overlay path was given",
            ));
        }
        (_, false) => None,
    };

    let mut inputs = vec![GraphInput {
        role: InputRole::Background,
        path: paths.background.clone(),
    }];
    inputs.extend(paths.layers.iter().enumerate().map(|(i, p)| GraphInput {
        role: InputRole::Layer(i),
        path: p.clone(),
    }));
    let outro_idx = inputs.len();
    inputs.push(GraphInput {
        role: InputRole::Outro,
        path: paths.outro.clone(),
    });
    let overlay_idx = overlay_path.map(|path| {
        inputs.push(GraphInput {
            role: InputRole::Overlay,
            path,
        });
        inputs.len() - 1
    });

    let main = timing.main_frames();
    let fade = timing.fade_frames();
    let cycle = timing.cycle_length();
    let outro_fade = timing.outro_fade_frames();

    let mut chains = Vec::new();
    chains.push(format!(
        "[0:v]format=rgba,trim=end_frame={main},setpts=PTS-STARTPTS[base]"
    ));
    let mut current = "base".to_owned();
    for i in 0..timing.layer_count() {
        let start = cycle * i as u64;
        chains.push(format!(
            "[{input}:v]format=rgba,trim=end_frame={main},setpts=PTS-STARTPTS,{geq}[l{i}]",
            input = i + 1,
            geq = clamp_alpha(&layer_opacity_expr(start, fade)),
        ));
        chains.push(format!(
            "[{current}][l{i}]overlay=format=auto:shortest=1[c{i}]"
        ));
        current = format!("c{i}");
    }

    if outro_fade > 0 {
        chains.push(format!(
            "[{outro_idx}:v]format=rgba,trim=end_frame={outro_fade},setpts=PTS-STARTPTS,{geq}[outro]",
            geq = clamp_alpha(&outro_opacity_expr(outro_fade)),
        ));
        chains.push(format!("[{current}][outro]concat=n=2:v=1:a=0[seq]"));
        current = "seq".to_owned();
    }

    if let Some(ov) = overlay_idx {
        let (x, y) = geometry.offset;
        chains.push(format!(
            "[{current}]pad={w}:{h}:{x}:{y}:color=black@0[padded]",
            w = geometry.canvas.width,
            h = geometry.canvas.height,
        ));
        chains.push(format!(
            "[padded][{ov}:v]overlay=0:0:format=auto:shortest=1[final]"
        ));
        current = "final".to_owned();
    }
    chains.extend(flatten_chains(&current, bg_rgba, geometry.canvas, timing.fps()));

    tracing::debug!(chains = chains.len(), inputs = inputs.len(), "built filter graph");
    Ok(FilterGraph {
        inputs,
        chains,
        output_label: "[flat]".to_owned(),
        canvas: geometry.canvas,
        fps: timing.fps(),
        total_frames: timing.total_frames(),
    })
}

#[cfg(test)]
#[path = "../../tests/unit/graph/filter.rs"]
mod tests;
