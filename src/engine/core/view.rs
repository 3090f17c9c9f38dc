use nalgebra::{Isometry3, Matrix4, Point3};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Eye {
    #[default]
    Left,
    Right,
}

impl Eye {
    pub const fn index(self) -> i32 {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Viewport {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Viewport {
            x,
            y,
            width,
            height,
        }
    }
}

/// A camera to draw the scene from.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderView {
    projection: Matrix4<f32>,
    camera_transform: Matrix4<f32>,
    view_matrix: Matrix4<f32>,
    viewport: Option<Viewport>,
    eye: Eye,
}

impl RenderView {
    pub fn new(
        projection: Matrix4<f32>,
        view_transform: Isometry3<f32>,
        viewport: Option<Viewport>,
        eye: Eye,
    ) -> Self {
        RenderView {
            projection,
            camera_transform: view_transform.to_homogeneous(),
            view_matrix: view_transform.inverse().to_homogeneous(),
            viewport,
            eye,
        }
    }

    /// Builds a view from an explicit view matrix. Fails if the matrix cannot be inverted.
    pub fn from_view_matrix(
        projection: Matrix4<f32>,
        view_matrix: Matrix4<f32>,
        viewport: Option<Viewport>,
        eye: Eye,
    ) -> Option<Self> {
        let camera_transform = view_matrix.try_inverse()?;

        Some(RenderView {
            projection,
            camera_transform,
            view_matrix,
            viewport,
            eye,
        })
    }

    pub fn projection_matrix(&self) -> &Matrix4<f32> {
        &self.projection
    }

    pub fn view_matrix(&self) -> &Matrix4<f32> {
        &self.view_matrix
    }

    /// Camera pose in world space, the inverse of [`Self::view_matrix`].
    pub fn camera_transform(&self) -> &Matrix4<f32> {
        &self.camera_transform
    }

    pub fn camera_position(&self) -> Point3<f32> {
        let t = self.camera_transform.fixed_view::<3, 1>(0, 3);
        Point3::new(t[0], t[1], t[2])
    }

    pub fn viewport(&self) -> Option<Viewport> {
        self.viewport
    }

    pub fn eye(&self) -> Eye {
        self.eye
    }

    pub fn set_eye(&mut self, eye: Eye) {
        self.eye = eye;
    }

    pub fn eye_index(&self) -> i32 {
        self.eye.index()
    }
}
