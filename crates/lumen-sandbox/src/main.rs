use std::path::PathBuf;

use anyhow::{Context, Result};
use glam::{Affine2, Vec2};
use image::{Rgba, RgbaImage};

use lumen_render::blend::BlendModeId;
use lumen_render::context::WgpuContext;
use lumen_render::geom::Rect;
use lumen_render::host::{Game, Host, HostConfig, HostControl};
use lumen_render::logging::{init_logging, LoggingConfig};
use lumen_render::mask::{BitmapMask, Mask};
use lumen_render::pipeline::{FlatTintPipeline, Light2DPipeline, Quad, Renderable, TextureTintPipeline};
use lumen_render::renderer::SnapshotFormat;
use lumen_render::resources::{TextureDescriptor, TextureHandle};
use lumen_render::scene::{Camera, Light, Scene};
use lumen_render::time::FrameTime;
use lumen_render::{Color, Renderer, RendererConfig};

type Gl = WgpuContext;

fn checkerboard(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, y| {
        if (x / cell + y / cell) % 2 == 0 { Rgba(a) } else { Rgba(b) }
    })
}

/// Soft round spot, used as the mask source.
fn spot(size: u32) -> RgbaImage {
    let half = size as f32 * 0.5;
    RgbaImage::from_fn(size, size, |x, y| {
        let d = Vec2::new(x as f32 + 0.5 - half, y as f32 + 0.5 - half).length() / half;
        let alpha = ((1.0 - d) * 4.0).clamp(0.0, 1.0);
        Rgba([255, 255, 255, (alpha * 255.0) as u8])
    })
}

/// Bumps encoded as tangent-space normals.
fn ridges(size: u32) -> RgbaImage {
    RgbaImage::from_fn(size, size, |x, _| {
        let nx = (x as f32 * 0.4).sin();
        let n = Vec2::new(nx, 0.0);
        let z = (1.0 - n.length_squared()).max(0.0).sqrt();
        let enc = |v: f32| ((v * 0.5 + 0.5) * 255.0) as u8;
        Rgba([enc(n.x), enc(n.y), enc(z), 255])
    })
}

fn upload(renderer: &mut Renderer<Gl>, image: &RgbaImage) -> Result<TextureHandle> {
    let desc = TextureDescriptor::new(image.width(), image.height()).with_pixels(image.as_raw());
    Ok(renderer.create_texture_2d(desc)?)
}

struct Sprite {
    texture: TextureHandle,
    position: Vec2,
    size: Vec2,
    rotation: f32,
    tint: Color,
    blend: BlendModeId,
    mask: Option<BitmapMask<Gl>>,
}

impl Sprite {
    fn new(texture: TextureHandle, position: Vec2, size: Vec2) -> Self {
        Self {
            texture,
            position,
            size,
            rotation: 0.0,
            tint: Color::WHITE,
            blend: BlendModeId::NORMAL,
            mask: None,
        }
    }

    fn quad(&self, camera: &Camera) -> Quad {
        let transform = camera.matrix()
            * Affine2::from_translation(self.position)
            * Affine2::from_angle(self.rotation);
        Quad::transformed(self.size, Vec2::splat(0.5), transform, self.tint)
    }
}

impl Renderable<Gl> for Sprite {
    fn blend_mode(&self) -> BlendModeId {
        self.blend
    }

    fn mask(&self) -> Option<&dyn Mask<Gl>> {
        self.mask.as_ref().map(|m| m as &dyn Mask<Gl>)
    }

    fn render_gl(&self, renderer: &mut Renderer<Gl>, _interpolation: f32, camera: &Camera) {
        let id = renderer.default_pipelines().texture_tint;
        let quad = self.quad(camera);
        renderer.with_pipeline::<TextureTintPipeline, _>(id, Some(self), |p, core| {
            p.batch_quad(core, self.texture, &quad)
        });
    }
}

struct LitSprite {
    sprite: Sprite,
    normal: TextureHandle,
}

impl Renderable<Gl> for LitSprite {
    fn normal_map(&self) -> Option<TextureHandle> {
        Some(self.normal)
    }

    fn render_gl(&self, renderer: &mut Renderer<Gl>, _interpolation: f32, camera: &Camera) {
        let id = renderer.default_pipelines().light;
        let quad = self.sprite.quad(camera);
        renderer.with_pipeline::<Light2DPipeline, _>(id, Some(self), |p, core| {
            p.batch_quad(core, self.sprite.texture, &quad)
        });
    }
}

/// Outlined panel drawn with the flat pipeline.
struct Panel {
    rect: Rect,
    fill: Color,
    border: Color,
}

impl Renderable<Gl> for Panel {
    fn render_gl(&self, renderer: &mut Renderer<Gl>, _interpolation: f32, camera: &Camera) {
        let id = renderer.default_pipelines().flat_tint;
        let corners = [
            self.rect.min(),
            Vec2::new(self.rect.max().x, self.rect.min().y),
            self.rect.max(),
            Vec2::new(self.rect.min().x, self.rect.max().y),
        ]
        .map(|p| camera.world_to_screen(p));

        renderer.with_pipeline::<FlatTintPipeline, _>(id, Some(self), |p, core| {
            p.batch_fill_polygon(core, &corners, self.fill);
            for i in 0..corners.len() {
                let next = corners[(i + 1) % corners.len()];
                p.batch_line(core, corners[i], next, 2.0, self.border);
            }
        });
    }
}

struct Objects {
    panel: Panel,
    sprites: Vec<Sprite>,
    masked: Sprite,
    lit: LitSprite,
}

impl Objects {
    fn build(renderer: &mut Renderer<Gl>) -> Result<Self> {
        let checker = upload(renderer, &checkerboard(64, 8, [230, 90, 60, 255], [40, 40, 60, 255]))?;
        let stripes = upload(renderer, &checkerboard(64, 16, [80, 200, 255, 255], [255, 255, 255, 64]))?;
        let spot = upload(renderer, &spot(128))?;
        let normal = upload(renderer, &ridges(64))?;

        let modes = [BlendModeId::NORMAL, BlendModeId::ADD, BlendModeId::MULTIPLY, BlendModeId::SCREEN];
        let sprites = modes
            .iter()
            .enumerate()
            .map(|(i, &blend)| {
                let mut s = Sprite::new(stripes, Vec2::new(140.0 + i as f32 * 110.0, 160.0), Vec2::splat(96.0));
                s.blend = blend;
                s
            })
            .collect();

        let source = Sprite::new(spot, Vec2::new(220.0, 420.0), Vec2::splat(180.0));
        let mut masked = Sprite::new(checker, Vec2::new(220.0, 420.0), Vec2::splat(200.0));
        masked.mask = Some(BitmapMask::new(renderer, Box::new(source))?);

        let lit = LitSprite {
            sprite: Sprite::new(checker, Vec2::new(560.0, 420.0), Vec2::splat(200.0)),
            normal,
        };

        Ok(Self {
            panel: Panel {
                rect: Rect::new(60.0, 80.0, 500.0, 160.0),
                fill: Color::rgba(0.1, 0.1, 0.15, 1.0),
                border: Color::from_hex(0x8899aa),
            },
            sprites,
            masked,
            lit,
        })
    }
}

struct Sandbox {
    objects: Option<Objects>,
    scene: Scene,
    camera: Camera,
    elapsed: f32,
    snapshot_path: Option<PathBuf>,
}

impl Sandbox {
    fn new() -> Self {
        let mut scene = Scene::default();
        scene.lights.enable();
        scene.lights.ambient_color = Color::rgba(0.2, 0.2, 0.25, 1.0);
        scene.lights.add_light(Light::new(Vec2::new(560.0, 420.0), 160.0, Color::from_hex(0xffd9a0), 1.2));

        Self {
            objects: None,
            scene,
            camera: Camera::new(0.0, 0.0, 800.0, 600.0),
            elapsed: 0.0,
            snapshot_path: Some(PathBuf::from("lumen-snapshot.png")),
        }
    }
}

impl Game for Sandbox {
    fn init(&mut self, renderer: &mut Renderer<Gl>) -> Result<()> {
        self.objects = Some(Objects::build(renderer).context("building sandbox objects")?);
        log::info!("sandbox ready at {}x{}", renderer.width(), renderer.height());
        Ok(())
    }

    fn update(&mut self, time: &FrameTime) -> HostControl {
        self.elapsed += time.dt;

        if let Some(objects) = self.objects.as_mut() {
            for (i, sprite) in objects.sprites.iter_mut().enumerate() {
                sprite.rotation = self.elapsed * (0.5 + i as f32 * 0.25);
            }
            objects.masked.mask.iter_mut().for_each(|m| m.invert_alpha = (self.elapsed as u32 / 3) % 2 == 1);
        }
        if let Some(light) = self.scene.lights.lights_mut().first_mut() {
            light.position = Vec2::new(560.0 + self.elapsed.cos() * 90.0, 420.0 + self.elapsed.sin() * 90.0);
        }
        HostControl::Continue
    }

    fn render(&mut self, renderer: &mut Renderer<Gl>, interpolation: f32) {
        let Some(objects) = self.objects.as_ref() else { return };
        self.camera.width = renderer.config().width as f32;
        self.camera.height = renderer.config().height as f32;

        let mut children: Vec<&dyn Renderable<Gl>> = vec![&objects.panel];
        children.extend(objects.sprites.iter().map(|s| s as &dyn Renderable<Gl>));
        children.push(&objects.masked);
        children.push(&objects.lit);

        renderer.render(&self.scene, &children, interpolation, &self.camera);

        if let Some(path) = self.snapshot_path.take() {
            renderer.snapshot(
                move |result| match result {
                    Ok(snapshot) => match std::fs::write(&path, &snapshot.encoded) {
                        Ok(()) => log::info!("snapshot written to {}", path.display()),
                        Err(e) => log::error!("writing {}: {e}", path.display()),
                    },
                    Err(e) => log::error!("snapshot failed: {e}"),
                },
                SnapshotFormat::Png,
                1.0,
            );
        }
    }

    fn context_restored(&mut self, renderer: &mut Renderer<Gl>) -> Result<()> {
        log::info!("context restored, rebuilding sandbox objects");
        self.init(renderer)
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = HostConfig {
        title: "lumen sandbox".to_string(),
        renderer: RendererConfig {
            background_color: Color::from_hex(0x202028),
            ..RendererConfig::default()
        },
        ..HostConfig::default()
    };
    Host::run(config, Sandbox::new())
}
