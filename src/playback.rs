use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::TimestepBundle;
use crate::config::{clamp_threshold, clamp_z_scale};
use crate::mesh::{Mesh, build_mesh};

pub const DEFAULT_FRAME_PERIOD: Duration = Duration::from_millis(300);
pub const COLOR_MAX: f64 = 1.0;

/// 播放到最后一帧之后的行为
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OnComplete {
    /// 回到第一帧继续播放
    Loop,
    /// 停在最后一帧
    #[default]
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackOptions {
    pub on_complete: OnComplete,
    pub frame_period: Duration,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        PlaybackOptions {
            on_complete: OnComplete::default(),
            frame_period: DEFAULT_FRAME_PERIOD,
        }
    }
}

/// 对外暴露的播放状态
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlaybackState {
    pub current_index: usize,
    pub timestep: Option<u32>,
    pub timestep_count: usize,
    pub playing: bool,
    pub z_scale: u32,
    pub show_injectors: bool,
    pub display_threshold: f64,
    /// 实际色标下限 max(display_threshold, 数据包阈值)
    pub display_min: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AspectRatio {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// 一帧的渲染数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderFrame {
    pub timestep: Option<u32>,
    pub cell_count: usize,
    pub mesh: Mesh,
    pub injectors: Option<Mesh>,
    pub cmin: f64,
    pub cmax: f64,
    pub aspect_ratio: AspectRatio,
}

/// HTTP 接口接收的播放指令
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum PlaybackCommand {
    Seek { index: usize },
    Play,
    Pause,
    Stop,
    Advance,
    Tick { elapsed_ms: u64 },
    Threshold { value: f64 },
    ToggleInjectors,
    ZScale { value: i64 },
}

/// 时间步播放状态机
///
/// 索引 0..N-1 对应升序的时间步编号。定时由宿主驱动：
/// 宿主定期调用 `tick`，累计时间每满一个帧间隔前进一帧。
/// 时间步列表为空也是合法状态，此时 seek/advance 不做任何事。
#[derive(Debug, Clone)]
pub struct PlaybackController {
    timesteps: Vec<u32>,
    base_threshold: f64,
    options: PlaybackOptions,
    current_index: usize,
    playing: bool,
    z_scale: u32,
    show_injectors: bool,
    display_threshold: f64,
    pending: Duration,
    needs_render: bool,
}

fn duration_from_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    let secs = u64::try_from(nanos / NANOS_PER_SEC).unwrap_or(u64::MAX);
    Duration::new(secs, (nanos % NANOS_PER_SEC) as u32)
}

impl PlaybackController {
    pub fn new(timesteps: Vec<u32>, base_threshold: f64, options: PlaybackOptions) -> Self {
        PlaybackController {
            timesteps,
            base_threshold,
            options,
            current_index: 0,
            playing: false,
            z_scale: 1,
            show_injectors: true,
            display_threshold: base_threshold,
            pending: Duration::ZERO,
            needs_render: true,
        }
    }

    pub fn for_bundle(bundle: &TimestepBundle, options: PlaybackOptions) -> Self {
        Self::new(bundle.timesteps.clone(), bundle.threshold, options)
    }

    pub fn len(&self) -> usize {
        self.timesteps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timesteps.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_timestep(&self) -> Option<u32> {
        self.timesteps.get(self.current_index).copied()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn needs_render(&self) -> bool {
        self.needs_render
    }

    pub fn mark_rendered(&mut self) {
        self.needs_render = false;
    }

    pub fn seek(&mut self, index: usize) {
        if self.timesteps.is_empty() {
            return;
        }
        self.current_index = index.min(self.timesteps.len() - 1);
        self.needs_render = true;
    }

    pub fn play(&mut self) {
        self.playing = true;
    }

    pub fn pause(&mut self) {
        self.playing = false;
        self.pending = Duration::ZERO;
    }

    pub fn stop(&mut self) {
        self.pause();
    }

    /// 前进一帧，到达末尾时按 `on_complete` 回到开头或停止
    pub fn advance(&mut self) {
        if self.timesteps.is_empty() {
            return;
        }
        if self.current_index + 1 < self.timesteps.len() {
            self.seek(self.current_index + 1);
            return;
        }
        match self.options.on_complete {
            OnComplete::Loop => self.seek(0),
            OnComplete::Stop => self.pause(),
        }
    }

    /// 返回本次前进的帧数
    ///
    /// 累计时间一次性折算成帧数，循环模式下直接取模定位。
    pub fn tick(&mut self, elapsed: Duration) -> usize {
        if !self.playing {
            return 0;
        }
        let period = self.options.frame_period;
        if period.is_zero() {
            self.advance();
            return 1;
        }

        let pending = self.pending.saturating_add(elapsed).as_nanos();
        let period_nanos = period.as_nanos();
        let frames = pending / period_nanos;
        self.pending = duration_from_nanos(pending % period_nanos);
        if frames == 0 || self.timesteps.is_empty() {
            return 0;
        }

        let len = self.timesteps.len() as u128;
        let current = self.current_index as u128;
        let remaining = len - 1 - current;
        if frames <= remaining {
            self.seek((current + frames) as usize);
            return frames as usize;
        }
        match self.options.on_complete {
            OnComplete::Loop => {
                self.seek(((current + frames % len) % len) as usize);
                usize::try_from(frames).unwrap_or(usize::MAX)
            }
            OnComplete::Stop => {
                // 走到最后一帧，再多一帧触发停止
                self.seek(self.timesteps.len() - 1);
                self.pause();
                remaining as usize + 1
            }
        }
    }

    /// 只改变色标下限，不重新过滤单元
    pub fn set_threshold_view(&mut self, threshold: f64) {
        self.display_threshold = clamp_threshold(threshold);
        self.needs_render = true;
    }

    pub fn display_min(&self) -> f64 {
        self.display_threshold.max(self.base_threshold)
    }

    pub fn toggle_injectors(&mut self) -> bool {
        self.show_injectors = !self.show_injectors;
        self.needs_render = true;
        self.show_injectors
    }

    pub fn set_z_scale(&mut self, z_scale: i64) {
        self.z_scale = clamp_z_scale(z_scale);
        self.needs_render = true;
    }

    pub fn apply(&mut self, command: PlaybackCommand) {
        match command {
            PlaybackCommand::Seek { index } => self.seek(index),
            PlaybackCommand::Play => self.play(),
            PlaybackCommand::Pause => self.pause(),
            PlaybackCommand::Stop => self.stop(),
            PlaybackCommand::Advance => self.advance(),
            PlaybackCommand::Tick { elapsed_ms } => {
                self.tick(Duration::from_millis(elapsed_ms));
            }
            PlaybackCommand::Threshold { value } => self.set_threshold_view(value),
            PlaybackCommand::ToggleInjectors => {
                self.toggle_injectors();
            }
            PlaybackCommand::ZScale { value } => self.set_z_scale(value),
        }
    }

    pub fn state(&self) -> PlaybackState {
        PlaybackState {
            current_index: self.current_index,
            timestep: self.current_timestep(),
            timestep_count: self.timesteps.len(),
            playing: self.playing,
            z_scale: self.z_scale,
            show_injectors: self.show_injectors,
            display_threshold: self.display_threshold,
            display_min: self.display_min(),
        }
    }

    pub fn render(&self, bundle: &TimestepBundle) -> RenderFrame {
        let timestep = self.current_timestep();
        let cells = timestep
            .and_then(|ts| bundle.cells(ts))
            .map(|ts| ts.cells.as_slice())
            .unwrap_or_default();

        RenderFrame {
            timestep,
            cell_count: cells.len(),
            mesh: build_mesh(cells, &bundle.grid),
            injectors: self.show_injectors.then(|| bundle.injectors.to_mesh()),
            cmin: self.display_min(),
            cmax: COLOR_MAX,
            aspect_ratio: AspectRatio {
                x: 1.0,
                y: 1.0,
                z: self.z_scale as f64,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::cache::TimestepCells;
    use crate::grid::{ActiveCell, CellSize, DEFAULT_BOUNDS};
    use crate::mesh::{InjectorConfig, InjectorGeometry};

    fn controller(n: u32, on_complete: OnComplete) -> PlaybackController {
        let options = PlaybackOptions {
            on_complete,
            ..PlaybackOptions::default()
        };
        PlaybackController::new((1..=n).collect(), 0.1, options)
    }

    fn bundle() -> TimestepBundle {
        let cell = ActiveCell {
            x: 0.0,
            y: 0.0,
            z: -2700.0,
            value: 0.6,
        };
        let mut data = BTreeMap::new();
        data.insert(1, TimestepCells::new(vec![cell]));
        data.insert(2, TimestepCells::new(vec![cell, cell]));
        TimestepBundle {
            threshold: 0.1,
            timesteps: vec![1, 2],
            data,
            injectors: InjectorGeometry::from_config(&InjectorConfig::default()),
            grid: CellSize {
                dx: 100.0,
                dy: 100.0,
                dz: 20.0,
            },
            bounds: DEFAULT_BOUNDS,
        }
    }

    #[test]
    fn seek_clamps_to_last_index() {
        let mut p = controller(5, OnComplete::Stop);
        p.seek(42);
        assert_eq!(p.current_index(), 4);
        assert_eq!(p.current_timestep(), Some(5));
    }

    #[test]
    fn loop_wraps_to_start() {
        let mut p = controller(3, OnComplete::Loop);
        p.play();
        p.seek(2);
        p.advance();
        assert_eq!(p.current_index(), 0);
        assert!(p.is_playing());
    }

    #[test]
    fn stop_halts_on_last_frame() {
        let mut p = controller(3, OnComplete::Stop);
        p.play();
        p.seek(2);
        p.advance();
        assert_eq!(p.current_index(), 2);
        assert!(!p.is_playing());
    }

    #[test]
    fn tick_advances_per_frame_period() {
        let mut p = controller(10, OnComplete::Stop);
        assert_eq!(p.tick(Duration::from_secs(1)), 0);

        p.play();
        assert_eq!(p.tick(Duration::from_millis(250)), 0);
        assert_eq!(p.tick(Duration::from_millis(100)), 1);
        assert_eq!(p.current_index(), 1);
        assert_eq!(p.tick(Duration::from_millis(650)), 2);
        assert_eq!(p.current_index(), 3);

        // 暂停会丢弃累计时间
        p.tick(Duration::from_millis(200));
        p.pause();
        p.play();
        assert_eq!(p.tick(Duration::from_millis(200)), 0);
    }

    #[test]
    fn tick_stops_at_end_without_wrapping() {
        let mut p = controller(3, OnComplete::Stop);
        p.play();
        assert_eq!(p.tick(Duration::from_secs(10)), 3);
        assert_eq!(p.current_index(), 2);
        assert!(!p.is_playing());
    }

    #[test]
    fn huge_elapsed_loops_in_one_step() {
        let mut p = controller(7, OnComplete::Loop);
        p.play();
        let frames = u64::MAX / 300;
        assert_eq!(p.tick(Duration::from_millis(u64::MAX)), frames as usize);
        assert_eq!(p.current_index(), (frames % 7) as usize);
        assert!(p.is_playing());

        // 余下的 15ms 保留到下一次
        let before = p.current_index();
        assert_eq!(p.tick(Duration::from_millis(284)), 0);
        assert_eq!(p.tick(Duration::from_millis(1)), 1);
        assert_eq!(p.current_index(), (before + 1) % 7);

        p.apply(serde_json::from_str(r#"{"command":"tick","elapsed_ms":18446744073709551615}"#).unwrap());
        assert!(p.is_playing());
    }

    #[test]
    fn huge_elapsed_stops_on_last_frame() {
        let mut p = controller(5, OnComplete::Stop);
        p.play();
        p.seek(1);
        assert_eq!(p.tick(Duration::from_millis(u64::MAX)), 4);
        assert_eq!(p.current_index(), 4);
        assert!(!p.is_playing());
        assert_eq!(p.tick(Duration::from_millis(u64::MAX)), 0);
    }

    #[test]
    fn display_min_never_below_bundle_threshold() {
        let mut p = controller(2, OnComplete::Stop);
        p.set_threshold_view(0.05);
        assert_eq!(p.display_min(), 0.1);
        p.set_threshold_view(0.3);
        assert_eq!(p.display_min(), 0.3);
    }

    #[test]
    fn z_scale_is_clamped() {
        let mut p = controller(2, OnComplete::Stop);
        p.set_z_scale(0);
        assert_eq!(p.state().z_scale, 1);
        p.set_z_scale(99);
        assert_eq!(p.state().z_scale, 20);
    }

    #[test]
    fn empty_timesteps_are_valid() {
        let mut p = controller(0, OnComplete::Loop);
        p.seek(3);
        p.play();
        p.advance();
        p.tick(Duration::from_secs(5));
        assert_eq!(p.current_index(), 0);
        assert_eq!(p.current_timestep(), None);

        let frame = p.render(&bundle());
        assert!(frame.mesh.is_empty());
        assert_eq!(frame.timestep, None);
    }

    #[test]
    fn render_builds_current_timestep() {
        let b = bundle();
        let mut p = PlaybackController::for_bundle(&b, PlaybackOptions::default());
        p.seek(1);
        p.set_z_scale(8);
        let frame = p.render(&b);
        assert_eq!(frame.timestep, Some(2));
        assert_eq!(frame.cell_count, 2);
        assert_eq!(frame.mesh.vertex_count(), 16);
        assert_eq!(frame.mesh.triangle_count(), 24);
        assert_eq!(frame.cmin, 0.1);
        assert_eq!(frame.cmax, 1.0);
        assert_eq!(frame.aspect_ratio.z, 8.0);
        assert_eq!(frame.injectors.as_ref().map(|m| m.vertex_count()), Some(32));

        assert!(!p.toggle_injectors());
        assert!(p.render(&b).injectors.is_none());
    }

    #[test]
    fn commands_deserialize_from_json() {
        let mut p = controller(4, OnComplete::Stop);
        let commands = [
            r#"{"command":"seek","index":2}"#,
            r#"{"command":"play"}"#,
            r#"{"command":"tick","elapsed_ms":300}"#,
            r#"{"command":"z_scale","value":5}"#,
            r#"{"command":"toggle_injectors"}"#,
            r#"{"command":"threshold","value":0.2}"#,
        ];
        for json in commands {
            p.apply(serde_json::from_str(json).unwrap());
        }
        let state = p.state();
        assert_eq!(state.current_index, 3);
        assert!(state.playing);
        assert_eq!(state.z_scale, 5);
        assert!(!state.show_injectors);
        assert_eq!(state.display_min, 0.2);
    }
}
