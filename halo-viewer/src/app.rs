use std::rc::Rc;

use ash::vk;
use halo_gfx::gfx::Gfx;
use halo_renderer::{
    frame::Frame,
    frame_counter::FrameCounter,
    frame_task::{FrameTask, SceneRenderRequest},
    overlay::NullOverlay,
    resize::SwapchainResizeCoordinator,
    scene::Scene,
    shared_data::SharedData,
};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::{camera::OrbitCamera, config::ViewerConfig, demo_scene, input::ViewerInput, skybox::GradientSkybox};

/// window 创建之后才能初始化的部分
struct RenderState {
    shared: SharedData,
    frames: Vec<Frame>,
    frame_counter: FrameCounter,
    resize: SwapchainResizeCoordinator,
    last_execute_ok: bool,

    scene: Rc<Scene>,
    /// descriptor set 引用了其中的 view 和 sampler
    _skybox: GradientSkybox,
    overlay: NullOverlay,
}
impl RenderState {
    fn new(window_extent: vk::Extent2D) -> anyhow::Result<Self> {
        let mut shared = SharedData::new(window_extent)?;

        let skybox = GradientSkybox::new()?;
        shared.set_skybox(skybox.view(), skybox.sampler())?;

        let scene = Rc::new(demo_scene::build_demo_scene()?);
        let frames =
            FrameCounter::frame_labels().into_iter().map(Frame::new).collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            shared,
            frames,
            frame_counter: FrameCounter::new(0),
            resize: SwapchainResizeCoordinator::new(window_extent),
            last_execute_ok: true,
            scene,
            _skybox: skybox,
            overlay: NullOverlay,
        })
    }

    fn destroy(self) -> anyhow::Result<()> {
        Gfx::get().wait_idle()?;
        let Self {
            shared,
            frames,
            scene,
            _skybox,
            ..
        } = self;
        for frame in frames {
            frame.destroy();
        }
        drop(scene);
        drop(_skybox);
        shared.destroy();
        Ok(())
    }
}

pub struct ViewerApp {
    config: ViewerConfig,
    camera: OrbitCamera,
    input: ViewerInput,

    render_state: Option<RenderState>,
    /// 需要在 Gfx 销毁之后再销毁
    window: Option<Window>,

    /// 事件循环中无法直接返回错误，退出之后再交给 main
    fatal_error: Option<anyhow::Error>,
}
// 总的入口
impl ViewerApp {
    pub fn run(config: ViewerConfig) -> anyhow::Result<()> {
        let event_loop = EventLoop::new()?;

        let mut app = Self {
            config,
            camera: OrbitCamera::default(),
            input: ViewerInput::default(),
            render_state: None,
            window: None,
            fatal_error: None,
        };

        event_loop.run_app(&mut app)?;
        log::info!("end run.");

        let destroy_result = app.destroy();
        match app.fatal_error.take() {
            Some(e) => Err(e),
            None => destroy_result,
        }
    }
}
// new & init
impl ViewerApp {
    /// 在 window 创建之后调用，初始化 Gfx 以及渲染相关的资源
    fn init_after_window(&mut self, event_loop: &ActiveEventLoop) -> anyhow::Result<()> {
        let window_config = &self.config.window;
        let window_attr = Window::default_attributes()
            .with_title(window_config.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(window_config.width, window_config.height));
        let window = event_loop.create_window(window_attr)?;

        let display_handle = window.display_handle().map_err(|e| anyhow::anyhow!("display handle: {e}"))?;
        let window_handle = window.window_handle().map_err(|e| anyhow::anyhow!("window handle: {e}"))?;
        Gfx::init(&window_config.title, display_handle.as_raw(), window_handle.as_raw())?;
        let window_extent = Self::window_extent(&window);
        self.window = Some(window);

        self.render_state = Some(RenderState::new(window_extent)?);
        Ok(())
    }

    fn window_extent(window: &Window) -> vk::Extent2D {
        let size = window.inner_size();
        vk::Extent2D {
            width: size.width,
            height: size.height,
        }
    }
}
// destroy
impl ViewerApp {
    fn destroy(&mut self) -> anyhow::Result<()> {
        let result = match self.render_state.take() {
            Some(render_state) => render_state.destroy(),
            None => Ok(()),
        };
        if self.window.is_some() {
            Gfx::destroy();
        }
        self.window = None;
        result
    }
}
// 每帧的流程
impl ViewerApp {
    fn redraw(&mut self) -> anyhow::Result<()> {
        let _span = tracy_client::span!("ViewerApp::redraw");
        let (Some(window), Some(render_state)) = (self.window.as_ref(), self.render_state.as_mut()) else {
            return Ok(());
        };

        let window_extent = Self::window_extent(window);
        if SwapchainResizeCoordinator::is_degenerate(window_extent) {
            // 最小化时不渲染
            return Ok(());
        }
        if render_state.resize.should_recreate(render_state.last_execute_ok, window_extent) {
            Gfx::get().wait_idle()?;
            render_state.shared.recreate_swapchain(window_extent)?;
            render_state.resize.on_recreated(window_extent);
            render_state.last_execute_ok = true;
        }

        let swapchain_extent = render_state.shared.swapchain()?.extent();
        let frame_label = render_state.frame_counter.frame_label();
        let task = FrameTask {
            camera: self.camera.camera(swapchain_extent.width as f32 / swapchain_extent.height as f32),
            passthru_rect: vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent: swapchain_extent,
            },
            solid_background: self.config.solid_background(),
            cursor_position: self.input.cursor(),
            scene: Some(SceneRenderRequest {
                scene: render_state.scene.clone(),
                rendering_nodes: (0..render_state.scene.nodes().len() as u32).collect(),
                selected_nodes: self.input.selected_nodes().clone(),
                selected_outline: self.config.selected_outline.style(),
                hovering_node: self.input.hovering_node(),
                hovering_outline: self.config.hovering_outline.style(),
                frustum_culling: self.config.frustum_culling,
            }),
            swapchain_resize: render_state.resize.take_slot_flag(frame_label),
        };

        let frame = &mut render_state.frames[*frame_label];
        let update_result = frame.update(&mut render_state.shared, &task)?;
        self.input.set_hovering(update_result.hovering_node_index);

        render_state.last_execute_ok = frame.execute(&render_state.shared, &mut render_state.overlay)?;
        render_state.frame_counter.next_frame();
        Ok(())
    }

    fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                let position = glam::Vec2::new(position.x as f32, position.y as f32);
                if let Some(delta) = self.input.on_cursor_moved(position) {
                    self.camera.rotate(delta);
                }
            }
            WindowEvent::CursorLeft { .. } => self.input.on_cursor_left(),
            WindowEvent::MouseInput { state, button, .. } => match button {
                MouseButton::Left if *state == ElementState::Pressed => self.input.select_hovering(),
                MouseButton::Right => self.input.set_rotating(*state == ElementState::Pressed),
                _ => {}
            },
            WindowEvent::MouseWheel { delta, .. } => {
                // 简化处理，仅考虑垂直滚动
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                self.camera.zoom(steps);
            }
            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(KeyCode::Escape),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => self.input.clear_selection(),
            _ => {}
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("{error:?}");
        self.fatal_error = Some(error);
        event_loop.exit();
    }
}
// 各种 winit 的事件处理
impl ApplicationHandler for ViewerApp {
    // 建议在这里创建 window 和 Renderer
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        log::info!("winit event: resumed");
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init_after_window(event_loop) {
            self.fail(event_loop, e);
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        self.handle_window_event(&event);

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                if let Err(e) = self.redraw() {
                    self.fail(event_loop, e);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        log::warn!("winit event: suspended");
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        log::info!("loop exiting");
    }
}
