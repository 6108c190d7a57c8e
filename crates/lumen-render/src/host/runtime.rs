use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::config::RendererConfig;
use crate::context::{WgpuContext, WgpuContextInit};
use crate::renderer::Renderer;
use crate::time::{FrameClock, FrameTime};

/// Window and renderer configuration for [`Host::run`].
#[derive(Debug, Clone)]
pub struct HostConfig {
    pub title: String,
    pub initial_size: LogicalSize<f64>,
    /// `width`, `height` and `resolution` are taken from the window.
    pub renderer: RendererConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            title: "lumen".to_string(),
            initial_size: LogicalSize::new(1280.0, 720.0),
            renderer: RendererConfig::default(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HostControl {
    Continue,
    Exit,
}

/// The game driven by the host, one window and one renderer.
pub trait Game: 'static {
    /// Runs once the renderer exists. Create GPU resources here.
    fn init(&mut self, renderer: &mut Renderer<WgpuContext>) -> Result<()>;

    /// Runs `time.steps` fixed steps worth of simulation.
    fn update(&mut self, _time: &FrameTime) -> HostControl {
        HostControl::Continue
    }

    /// Issues one `Renderer::render` per camera; the host brackets it with
    /// `pre_render` / `post_render`.
    fn render(&mut self, renderer: &mut Renderer<WgpuContext>, interpolation: f32);

    /// Every handle created before the loss is stale; recreate resources.
    fn context_restored(&mut self, renderer: &mut Renderer<WgpuContext>) -> Result<()> {
        self.init(renderer)
    }

    fn on_window_event(&mut self, _event: &WindowEvent) -> HostControl {
        HostControl::Continue
    }
}

/// Entry point for the winit event loop.
pub struct Host;

impl Host {
    pub fn run<A: Game>(config: HostConfig, game: A) -> Result<()> {
        let event_loop = EventLoop::new().context("failed to create winit EventLoop")?;
        let mut state = HostState {
            config,
            game,
            entry: None,
            exit_requested: false,
            backoff: RestoreBackoff::new(),
        };

        event_loop
            .run_app(&mut state)
            .context("winit event loop terminated with error")?;

        if let Some(mut entry) = state.entry.take() {
            entry.renderer.destroy();
        }
        Ok(())
    }
}

/// Spacing of restore attempts while the context stays lost.
#[derive(Debug, Clone)]
struct RestoreBackoff {
    next: Option<Instant>,
    delay: Duration,
}

impl RestoreBackoff {
    const MIN: Duration = Duration::from_millis(250);
    const MAX: Duration = Duration::from_secs(4);

    fn new() -> Self {
        Self { next: None, delay: Self::MIN }
    }

    fn due(&self, now: Instant) -> bool {
        self.next.is_none_or(|next| now >= next)
    }

    /// Schedules the next attempt, doubling the delay up to `MAX`.
    fn failed(&mut self, now: Instant) -> Instant {
        let next = now + self.delay;
        self.next = Some(next);
        self.delay = (self.delay * 2).min(Self::MAX);
        next
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

struct WindowEntry {
    window: Arc<Window>,
    renderer: Renderer<WgpuContext>,
    clock: FrameClock,
}

struct HostState<A: Game> {
    config: HostConfig,
    game: A,
    entry: Option<WindowEntry>,
    exit_requested: bool,
    backoff: RestoreBackoff,
}

impl<A: Game> HostState<A> {
    fn create_entry(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title(self.config.title.clone())
            .with_inner_size(self.config.initial_size)
            .with_transparent(self.config.renderer.context.transparent);

        let window = Arc::new(event_loop.create_window(attrs).context("failed to create window")?);

        let scale = window.scale_factor();
        let logical: LogicalSize<f64> = window.inner_size().to_logical(scale);
        let config = self
            .config
            .renderer
            .clone()
            .with_size(logical.width.round() as u32, logical.height.round() as u32)
            .with_resolution(scale as f32);

        let init = WgpuContextInit::from(&config.context);
        let context = WgpuContext::new(Arc::clone(&window), init).context("GPU initialization failed")?;
        let mut renderer = Renderer::new(context, config).context("renderer initialization failed")?;
        self.game.init(&mut renderer).context("game initialization failed")?;

        window.request_redraw();
        self.entry = Some(WindowEntry { window, renderer, clock: FrameClock::new() });
        Ok(())
    }

    fn request_exit(&mut self, event_loop: &ActiveEventLoop) {
        self.exit_requested = true;
        event_loop.exit();
    }

    fn resize(&mut self, size: PhysicalSize<u32>) {
        let Some(entry) = self.entry.as_mut() else { return };
        let scale = entry.window.scale_factor();
        let logical: LogicalSize<f64> = size.to_logical(scale);
        entry.renderer.resize_with_resolution(
            logical.width.round() as u32,
            logical.height.round() as u32,
            scale as f32,
        );
        entry.window.request_redraw();
    }

    fn restore(&mut self) -> Result<()> {
        let Some(entry) = self.entry.as_mut() else { return Ok(()) };
        if !entry.renderer.is_context_lost() {
            return Ok(());
        }
        entry.renderer.context_restored().context("GPU context restoration failed")?;
        self.game.context_restored(&mut entry.renderer).context("game restoration failed")?;
        entry.clock.reset();
        entry.window.request_redraw();
        self.backoff.reset();
        Ok(())
    }

    fn is_lost(&self) -> bool {
        self.entry.as_ref().is_some_and(|e| e.renderer.is_context_lost())
    }

    /// Retries restoration on the backoff schedule. Returns the time of the
    /// next attempt while the context stays lost.
    fn retry_restore(&mut self, now: Instant) -> Option<Instant> {
        if !self.backoff.due(now) {
            return self.backoff.next;
        }
        match self.restore() {
            Ok(()) => None,
            Err(e) => {
                let next = self.backoff.failed(now);
                log::warn!("{e:#}; retrying in {:?}", next - now);
                Some(next)
            }
        }
    }

    fn frame(&mut self) -> Result<HostControl> {
        let Some(entry) = self.entry.as_mut() else { return Ok(HostControl::Continue) };

        let time = entry.clock.tick();
        if self.game.update(&time) == HostControl::Exit {
            return Ok(HostControl::Exit);
        }

        entry.renderer.pre_render().context("pre_render failed")?;
        if entry.renderer.frame_open() {
            self.game.render(&mut entry.renderer, time.interpolation);
        }
        entry.renderer.post_render().context("post_render failed")?;
        Ok(HostControl::Continue)
    }
}

impl<A: Game> ApplicationHandler for HostState<A> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let result = if self.entry.is_none() {
            self.create_entry(event_loop)
        } else {
            self.backoff.reset();
            self.restore()
        };

        if let Err(e) = result {
            log::error!("{e:#}");
            self.request_exit(event_loop);
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(entry) = self.entry.as_mut() {
            entry.renderer.context_lost();
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if self.is_lost() {
            // No redraws while lost; wake up for the next restore attempt.
            let flow = match self.retry_restore(Instant::now()) {
                Some(next) => ControlFlow::WaitUntil(next),
                None => ControlFlow::Wait,
            };
            event_loop.set_control_flow(flow);
            return;
        }

        event_loop.set_control_flow(ControlFlow::Wait);
        if let Some(entry) = &self.entry {
            entry.window.request_redraw();
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        if self.exit_requested {
            event_loop.exit();
            return;
        }

        if self.game.on_window_event(&event) == HostControl::Exit {
            self.request_exit(event_loop);
            return;
        }

        match event {
            WindowEvent::CloseRequested => self.request_exit(event_loop),

            WindowEvent::Resized(size) => self.resize(size),

            WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(size) = self.entry.as_ref().map(|e| e.window.inner_size()) {
                    self.resize(size);
                }
            }

            WindowEvent::RedrawRequested => {
                // Restoration is driven from `about_to_wait` while lost.
                if self.is_lost() {
                    return;
                }

                match self.frame() {
                    Ok(HostControl::Continue) => {}
                    Ok(HostControl::Exit) => self.request_exit(event_loop),
                    Err(e) => {
                        log::error!("{e:#}");
                        self.request_exit(event_loop);
                    }
                }
            }

            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        let mut backoff = RestoreBackoff::new();
        let start = Instant::now();
        assert!(backoff.due(start));

        let first = backoff.failed(start);
        assert_eq!(first - start, RestoreBackoff::MIN);
        assert!(!backoff.due(start));
        assert!(backoff.due(first));

        let mut now = first;
        for _ in 0..10 {
            now = backoff.failed(now);
        }
        assert_eq!(backoff.failed(now) - now, RestoreBackoff::MAX);
    }

    #[test]
    fn reset_makes_the_next_attempt_immediate() {
        let mut backoff = RestoreBackoff::new();
        let now = Instant::now();
        backoff.failed(now);
        backoff.failed(now);
        backoff.reset();
        assert!(backoff.due(now));
        assert_eq!(backoff.failed(now) - now, RestoreBackoff::MIN);
    }
}
