//! Operation log for overlay drawing
//!
//! Each operation is a single vector primitive in PDF user space
//! (bottom-left origin, points). Operations are grouped per page and
//! replayed in insertion order when the overlay is written.

pub type OpId = u64;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOperation {
    /// A single line of black Helvetica; `(x, y)` is the start of the
    /// baseline.
    DrawText {
        id: OpId,
        page: u32,
        x: f64,
        y: f64,
        text: String,
        font_size: f64,
    },
    DrawCircle {
        id: OpId,
        page: u32,
        center_x: f64,
        center_y: f64,
        radius: f64,
        filled: bool,
    },
    /// Axis-aligned square or rectangle, outlined or filled.
    DrawSquare {
        id: OpId,
        page: u32,
        rect: PdfRect,
        filled: bool,
    },
}

impl DrawOperation {
    pub fn id(&self) -> OpId {
        match self {
            DrawOperation::DrawText { id, .. } => *id,
            DrawOperation::DrawCircle { id, .. } => *id,
            DrawOperation::DrawSquare { id, .. } => *id,
        }
    }

    pub fn page(&self) -> u32 {
        match self {
            DrawOperation::DrawText { page, .. } => *page,
            DrawOperation::DrawCircle { page, .. } => *page,
            DrawOperation::DrawSquare { page, .. } => *page,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    next_id: OpId,
    operations: Vec<DrawOperation>,
}

impl OperationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut op: DrawOperation) -> OpId {
        let id = self.next_id;
        self.next_id += 1;

        match &mut op {
            DrawOperation::DrawText { id: op_id, .. } => *op_id = id,
            DrawOperation::DrawCircle { id: op_id, .. } => *op_id = id,
            DrawOperation::DrawSquare { id: op_id, .. } => *op_id = id,
        }

        self.operations.push(op);
        id
    }

    pub fn operations(&self) -> &[DrawOperation] {
        &self.operations
    }

    pub fn operations_for_page(&self, page: u32) -> Vec<&DrawOperation> {
        self.operations
            .iter()
            .filter(|op| op.page() == page)
            .collect()
    }

    /// Distinct page numbers touched by the log, ascending.
    pub fn pages(&self) -> Vec<u32> {
        let mut pages: Vec<u32> = self.operations.iter().map(|op| op.page()).collect();
        pages.sort_unstable();
        pages.dedup();
        pages
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
