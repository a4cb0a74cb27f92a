/// A response body a benchmarked handler writes, split into fixed size chunks.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    body: TestBody,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, body: TestBody) -> Self {
        Self { name, group, body }
    }

    pub fn small(name: &'static str, body: TestBody) -> Self {
        Self::new(name, TestGroup::Small, body)
    }

    pub fn large(name: &'static str, body: TestBody) -> Self {
        Self::new(name, TestGroup::Large, body)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn body(&self) -> &TestBody {
        &self.body
    }

    /// The chunk size handlers use for this case's group.
    pub fn chunk_size(&self) -> usize {
        match self.group {
            TestGroup::Small => 64,
            TestGroup::Large => 4096,
        }
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TestBody {
    content: &'static [u8],
    repeat: usize,
}

impl TestBody {
    pub const fn new(content: &'static [u8], repeat: usize) -> Self {
        Self { content, repeat }
    }

    /// The full body as the handler writes it.
    pub fn to_vec(&self) -> Vec<u8> {
        self.content.repeat(self.repeat)
    }

    pub fn len(&self) -> usize {
        self.content.len() * self.repeat
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug)]
pub enum TestGroup {
    Small,
    Large,
}
