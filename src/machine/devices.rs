//! Memory-mapped peripheral boundaries: screen and keyboard.
//!
//! The execution engine talks to both devices through two narrow
//! contracts. The screen receives an opaque command buffer (a word slice
//! starting at the command id) and may write result values back into it;
//! the keyboard is polled once per cycle and owns a FIFO queue of key
//! events. Real windowed implementations live outside this crate; the
//! headless implementations here model the device state so programs can
//! run unattended and tests can observe the traffic.

use crate::errors::VmError;
use std::collections::VecDeque;

/// Default window width for a freshly created screen.
pub const DEFAULT_WINDOW_WIDTH: u64 = 1280;
/// Default window height for a freshly created screen.
pub const DEFAULT_WINDOW_HEIGHT: u64 = 720;
/// Default working-coordinate depth.
pub const DEFAULT_WORKING_DEPTH: u64 = 1280;

/// Commands understood by the screen peripheral.
///
/// The command id is the first word of the buffer forwarded by `st` to
/// channel INP/OUT address 2; operands follow in subsequent words.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ScreenCommand {
    /// `[cmd, width, height]` - resize the host window.
    SetWindowDimensions = 0,
    /// `[cmd, width, height, depth]` - set the logical coordinate space.
    SetWorkingDimensions = 1,
    /// `[cmd, len, ch0, ch1, ...]` - set the window title, one word per byte.
    SetWindowTitle = 2,
    /// `[cmd, visible]` - show or hide the window.
    SetWindowVisibility = 3,
    /// `[cmd, fullscreen]` - enter or leave fullscreen.
    SetWindowFullscreen = 4,
    /// `[cmd, interval]` - set the swap interval.
    SetWindowVsync = 5,
    /// `[cmd, r, g, b, a, x1, y1, z1, x2, y2, z2, x3, y3, z3]` - draw a triangle.
    DrawTriangle = 6,
    /// `[cmd]` - present the back buffer.
    SwapBuffers = 7,
    /// `[cmd, perspective]` - select perspective (1) or orthographic (0) projection.
    SetProjection = 8,
    /// `[cmd]` - clear the color and depth buffers.
    ClearBuffers = 9,
    /// `[cmd, out]` - write 1 into `out` when the window wants to close.
    GetWindowShouldClose = 10,
    /// `[cmd, out_w, out_h]` - write the current window dimensions back.
    GetWindowDimensions = 11,
}

impl TryFrom<u64> for ScreenCommand {
    type Error = VmError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        use ScreenCommand::*;
        Ok(match value {
            0 => SetWindowDimensions,
            1 => SetWorkingDimensions,
            2 => SetWindowTitle,
            3 => SetWindowVisibility,
            4 => SetWindowFullscreen,
            5 => SetWindowVsync,
            6 => DrawTriangle,
            7 => SwapBuffers,
            8 => SetProjection,
            9 => ClearBuffers,
            10 => GetWindowShouldClose,
            11 => GetWindowDimensions,
            other => {
                return Err(VmError::Screen {
                    reason: format!("got invalid screen command '{}'", other),
                });
            }
        })
    }
}

/// Presentation device boundary.
pub trait ScreenDevice {
    /// Executes one command buffer. Result values are written back into
    /// the buffer; the device reads only the words it needs.
    fn command(&mut self, data: &mut [u64]) -> Result<(), VmError>;

    /// Polled once after every successfully executed instruction.
    fn tick(&mut self) -> Result<(), VmError>;
}

/// One keyboard event as delivered by the host.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct KeyEvent {
    /// Device-independent key id.
    pub key: u32,
    /// Platform scancode for the key.
    pub scancode: u32,
    /// Press/release/repeat action.
    pub action: u8,
    /// Modifier bits held during the event.
    pub modifiers: u8,
}

impl KeyEvent {
    /// Packs the event as `action << 40 | modifiers << 32 | key`.
    pub fn packed_key(&self) -> u64 {
        (self.action as u64) << 40 | (self.modifiers as u64) << 32 | self.key as u64
    }

    /// Packs the event as `action << 40 | modifiers << 32 | scancode`.
    pub fn packed_scancode(&self) -> u64 {
        (self.action as u64) << 40 | (self.modifiers as u64) << 32 | self.scancode as u64
    }
}

/// Input device boundary: a FIFO queue of key events.
pub trait KeyboardDevice {
    /// Polled once after every successfully executed instruction.
    fn tick(&mut self) -> Result<(), VmError>;

    /// Number of queued events.
    fn pending(&self) -> u64;

    /// Removes and returns the oldest queued event.
    fn next_event(&mut self) -> Option<KeyEvent>;

    /// Translates a key id to the platform scancode.
    fn scancode_for(&self, key: u64) -> u64;
}

/// Screen implementation with no host window.
///
/// Tracks the virtual window state a real device would maintain and
/// counts draw traffic, which is enough for programs that size windows,
/// query dimensions, and render without a display attached.
#[derive(Debug)]
pub struct HeadlessScreen {
    window_width: u64,
    window_height: u64,
    working_width: u64,
    working_height: u64,
    working_depth: u64,
    title: String,
    visible: bool,
    fullscreen: bool,
    vsync: u64,
    perspective: bool,
    should_close: bool,
    triangles: u64,
    frames: u64,
}

impl HeadlessScreen {
    pub fn new() -> Self {
        Self {
            window_width: DEFAULT_WINDOW_WIDTH,
            window_height: DEFAULT_WINDOW_HEIGHT,
            working_width: DEFAULT_WINDOW_WIDTH,
            working_height: DEFAULT_WINDOW_HEIGHT,
            working_depth: DEFAULT_WORKING_DEPTH,
            title: String::new(),
            visible: false,
            fullscreen: false,
            vsync: 0,
            perspective: false,
            should_close: false,
            triangles: 0,
            frames: 0,
        }
    }

    /// Current window title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Current window dimensions.
    pub fn window_dimensions(&self) -> (u64, u64) {
        (self.window_width, self.window_height)
    }

    /// Current logical coordinate space: width, height, depth.
    pub fn working_dimensions(&self) -> (u64, u64, u64) {
        (self.working_width, self.working_height, self.working_depth)
    }

    /// Whether the window is shown.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Whether the window is fullscreen.
    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    /// Current swap interval.
    pub fn vsync_interval(&self) -> u64 {
        self.vsync
    }

    /// Whether perspective projection is selected.
    pub fn is_perspective(&self) -> bool {
        self.perspective
    }

    /// Triangles drawn since creation.
    pub fn triangles_drawn(&self) -> u64 {
        self.triangles
    }

    /// Frames presented since creation.
    pub fn frames_presented(&self) -> u64 {
        self.frames
    }

    /// Asks the running program to shut down at its next close query.
    pub fn request_close(&mut self) {
        self.should_close = true;
    }

    /// Reads operand `idx` of the buffer, faulting when it is missing.
    fn arg(data: &[u64], idx: usize) -> Result<u64, VmError> {
        data.get(idx).copied().ok_or_else(|| VmError::Screen {
            reason: format!("command buffer too short for operand {}", idx),
        })
    }

    /// Writes result word `idx`, faulting when the buffer is too short.
    fn write_back(data: &mut [u64], idx: usize, value: u64) -> Result<(), VmError> {
        match data.get_mut(idx) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(VmError::Screen {
                reason: format!("command buffer too short for result {}", idx),
            }),
        }
    }
}

impl Default for HeadlessScreen {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenDevice for HeadlessScreen {
    fn command(&mut self, data: &mut [u64]) -> Result<(), VmError> {
        let command = ScreenCommand::try_from(Self::arg(data, 0)?)?;
        match command {
            ScreenCommand::SetWindowDimensions => {
                self.window_width = Self::arg(data, 1)?;
                self.window_height = Self::arg(data, 2)?;
            }
            ScreenCommand::SetWorkingDimensions => {
                self.working_width = Self::arg(data, 1)?;
                self.working_height = Self::arg(data, 2)?;
                self.working_depth = Self::arg(data, 3)?;
            }
            ScreenCommand::SetWindowTitle => {
                let len = Self::arg(data, 1)?;
                let len = usize::try_from(len).map_err(|_| VmError::Screen {
                    reason: "window title length does not fit in memory".to_string(),
                })?;
                let mut title = String::with_capacity(len);
                for i in 0..len {
                    title.push(Self::arg(data, 2 + i)? as u8 as char);
                }
                self.title = title;
            }
            ScreenCommand::SetWindowVisibility => {
                self.visible = Self::arg(data, 1)? != 0;
            }
            ScreenCommand::SetWindowFullscreen => {
                self.fullscreen = Self::arg(data, 1)? != 0;
            }
            ScreenCommand::SetWindowVsync => {
                self.vsync = Self::arg(data, 1)?;
            }
            ScreenCommand::DrawTriangle => {
                // Color and three vertices must be present even though
                // nothing is rasterized without a host window.
                for i in 1..=13 {
                    Self::arg(data, i)?;
                }
                self.triangles += 1;
            }
            ScreenCommand::SwapBuffers => {
                self.frames += 1;
            }
            ScreenCommand::SetProjection => {
                self.perspective = Self::arg(data, 1)? != 0;
            }
            ScreenCommand::ClearBuffers => {}
            ScreenCommand::GetWindowShouldClose => {
                Self::write_back(data, 1, self.should_close as u64)?;
            }
            ScreenCommand::GetWindowDimensions => {
                Self::write_back(data, 1, self.window_width)?;
                Self::write_back(data, 2, self.window_height)?;
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<(), VmError> {
        Ok(())
    }
}

/// Keyboard implementation with no host window: an in-process event queue.
#[derive(Debug, Default)]
pub struct HeadlessKeyboard {
    queue: VecDeque<KeyEvent>,
}

impl HeadlessKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event to the queue, oldest first.
    pub fn push_event(&mut self, event: KeyEvent) {
        self.queue.push_back(event);
    }
}

impl KeyboardDevice for HeadlessKeyboard {
    fn tick(&mut self) -> Result<(), VmError> {
        Ok(())
    }

    fn pending(&self) -> u64 {
        self.queue.len() as u64
    }

    fn next_event(&mut self) -> Option<KeyEvent> {
        self.queue.pop_front()
    }

    /// Identity mapping; there is no platform layout without a host.
    fn scancode_for(&self, key: u64) -> u64 {
        key
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_command_try_from() {
        assert_eq!(
            ScreenCommand::try_from(0).unwrap(),
            ScreenCommand::SetWindowDimensions
        );
        assert_eq!(
            ScreenCommand::try_from(11).unwrap(),
            ScreenCommand::GetWindowDimensions
        );
        assert!(matches!(
            ScreenCommand::try_from(12),
            Err(VmError::Screen { .. })
        ));
    }

    #[test]
    fn headless_screen_window_dimensions() {
        let mut screen = HeadlessScreen::new();
        let mut buf = [0, 640, 480];
        screen.command(&mut buf).unwrap();
        assert_eq!(screen.window_dimensions(), (640, 480));

        let mut query = [11, 0, 0];
        screen.command(&mut query).unwrap();
        assert_eq!(&query[1..], &[640, 480]);
    }

    #[test]
    fn headless_screen_title() {
        let mut screen = HeadlessScreen::new();
        let mut buf = [2, 2, b'h' as u64, b'i' as u64];
        screen.command(&mut buf).unwrap();
        assert_eq!(screen.title(), "hi");
    }

    #[test]
    fn headless_screen_window_state_commands() {
        let mut screen = HeadlessScreen::new();
        assert_eq!(
            screen.working_dimensions(),
            (DEFAULT_WINDOW_WIDTH, DEFAULT_WINDOW_HEIGHT, DEFAULT_WORKING_DEPTH)
        );
        screen.command(&mut [1, 320, 200, 64]).unwrap();
        assert_eq!(screen.working_dimensions(), (320, 200, 64));

        assert!(!screen.is_visible());
        screen.command(&mut [3, 1]).unwrap();
        assert!(screen.is_visible());

        screen.command(&mut [4, 1]).unwrap();
        assert!(screen.is_fullscreen());

        screen.command(&mut [5, 2]).unwrap();
        assert_eq!(screen.vsync_interval(), 2);

        screen.command(&mut [8, 1]).unwrap();
        assert!(screen.is_perspective());

        // Clearing the buffers touches no tracked state.
        screen.command(&mut [9]).unwrap();
        assert!(screen.is_perspective());
    }

    #[test]
    fn headless_screen_draw_and_swap() {
        let mut screen = HeadlessScreen::new();
        let mut triangle = [6, 255, 0, 0, 255, 0, 0, 1, 10, 0, 1, 5, 10, 1];
        screen.command(&mut triangle).unwrap();
        screen.command(&mut [7]).unwrap();
        assert_eq!(screen.triangles_drawn(), 1);
        assert_eq!(screen.frames_presented(), 1);
    }

    #[test]
    fn headless_screen_should_close_query() {
        let mut screen = HeadlessScreen::new();
        let mut query = [10, 7];
        screen.command(&mut query).unwrap();
        assert_eq!(query[1], 0);
        screen.request_close();
        screen.command(&mut query).unwrap();
        assert_eq!(query[1], 1);
    }

    #[test]
    fn headless_screen_short_buffer() {
        let mut screen = HeadlessScreen::new();
        assert!(matches!(
            screen.command(&mut [0, 640]),
            Err(VmError::Screen { .. })
        ));
        assert!(matches!(
            screen.command(&mut [2, 5, b'x' as u64]),
            Err(VmError::Screen { .. })
        ));
    }

    #[test]
    fn headless_screen_invalid_command() {
        let mut screen = HeadlessScreen::new();
        assert!(matches!(
            screen.command(&mut [99]),
            Err(VmError::Screen { .. })
        ));
    }

    #[test]
    fn key_event_packing() {
        let event = KeyEvent {
            key: 65,
            scancode: 30,
            action: 1,
            modifiers: 0x02,
        };
        assert_eq!(event.packed_key(), 1u64 << 40 | 2u64 << 32 | 65);
        assert_eq!(event.packed_scancode(), 1u64 << 40 | 2u64 << 32 | 30);
    }

    #[test]
    fn headless_keyboard_queue_order() {
        let mut kbd = HeadlessKeyboard::new();
        assert_eq!(kbd.pending(), 0);
        assert_eq!(kbd.next_event(), None);

        let first = KeyEvent {
            key: 1,
            scancode: 10,
            action: 1,
            modifiers: 0,
        };
        let second = KeyEvent {
            key: 2,
            scancode: 20,
            action: 0,
            modifiers: 0,
        };
        kbd.push_event(first);
        kbd.push_event(second);
        assert_eq!(kbd.pending(), 2);
        assert_eq!(kbd.next_event(), Some(first));
        assert_eq!(kbd.next_event(), Some(second));
        assert_eq!(kbd.scancode_for(42), 42);
    }
}
