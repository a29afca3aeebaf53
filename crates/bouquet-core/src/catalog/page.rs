/// A window over a list of `total` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Zero-based page index, always within `0..pages`.
    pub index: usize,
    /// Page count; at least 1 even for an empty list.
    pub pages: usize,
    pub size: usize,
    pub total: usize,
}

impl Page {
    /// Clamps `requested` into range for a list of `total` rows.
    pub fn clamp(total: usize, page_size: usize, requested: usize) -> Self {
        let size = page_size.max(1);
        let pages = total.div_ceil(size).max(1);
        Self {
            index: requested.min(pages - 1),
            pages,
            size,
            total,
        }
    }

    pub fn offset(&self) -> usize {
        self.index * self.size
    }

    pub fn has_prev(&self) -> bool {
        self.index > 0
    }

    pub fn has_next(&self) -> bool {
        self.index + 1 < self.pages
    }

    /// Row range covered by this page.
    pub fn range(&self) -> std::ops::Range<usize> {
        let start = self.offset().min(self.total);
        let end = (start + self.size).min(self.total);
        start..end
    }

    /// Slices `rows` down to this page.
    pub fn slice<'a, T>(&self, rows: &'a [T]) -> &'a [T] {
        let end = self.range().end.min(rows.len());
        let start = self.range().start.min(end);
        &rows[start..end]
    }
}
