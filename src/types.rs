use std::fmt;

pub const DEFAULT_WIDTH: u32 = 640;
pub const DEFAULT_HEIGHT: u32 = 480;
pub const DEFAULT_FPS: u32 = 30;

/// Shared output mode for every spatially correlated generator. Depth and
/// color must run at the same resolution or joint coordinate conversion
/// between them is meaningless.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputMode {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl OutputMode {
    pub fn vga() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            fps: DEFAULT_FPS,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn frame_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }
}

impl Default for OutputMode {
    fn default() -> Self {
        Self::vga()
    }
}

/// Subject id assigned by the device; the session stores no identity of
/// its own and always reads the device's live view.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(pub u32);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user {}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandId(pub u32);

impl fmt::Display for HandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "hand {}", self.0)
    }
}

/// Real-world position in millimetres, device coordinate frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Point3 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.0},{:.0},{:.0})", self.x, self.y, self.z)
    }
}

/// Pixel-space position derived from a real-world point through the depth
/// generator's calibration.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Projective {
    pub x: f32,
    pub y: f32,
    pub depth: f32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GeneratorKind {
    Depth,
    Color,
    User,
    Gesture,
    Hand,
}

/// Gestures the device recognizes natively. The session never validates
/// gesture geometry, it only forwards recognition events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Gesture {
    Wave,
    Click,
    RaiseHand,
}

impl Gesture {
    pub fn name(&self) -> &'static str {
        match self {
            Gesture::Wave => "Wave",
            Gesture::Click => "Click",
            Gesture::RaiseHand => "RaiseHand",
        }
    }
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// RGB24 color frame. The session owns the backing buffer and overwrites
/// it in place on every poll; copy out anything that must outlive a cycle.
#[derive(Clone, Debug)]
pub struct ColorFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub frame_index: u64,
    pub timestamp: f64,
}

impl ColorFrame {
    pub const CHANNELS: usize = 3;

    pub fn empty(mode: OutputMode) -> Self {
        Self {
            width: mode.width,
            height: mode.height,
            data: vec![0u8; mode.pixel_count() * Self::CHANNELS],
            frame_index: 0,
            timestamp: 0.0,
        }
    }
}

/// Single-channel depth frame, one u16 sample per pixel in millimetres.
#[derive(Clone, Debug)]
pub struct DepthFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u16>,
    pub frame_index: u64,
    pub timestamp: f64,
}

impl DepthFrame {
    pub const CHANNELS: usize = 1;

    /// Largest sample value the device produces, used for display scaling.
    pub const MAX_DEPTH_MM: u16 = 4096;

    pub fn empty(mode: OutputMode) -> Self {
        Self {
            width: mode.width,
            height: mode.height,
            data: vec![0u16; mode.pixel_count()],
            frame_index: 0,
            timestamp: 0.0,
        }
    }
}
