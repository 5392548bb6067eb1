use thiserror::Error;

use crate::model::ids::{BlockId, LessonId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("catalog must contain at least one block")]
    Empty,

    #[error("block ids must run 1..=n in order, found {found} at position {position}")]
    NonSequentialBlock { position: usize, found: BlockId },

    #[error("block {block} has no lessons")]
    EmptyBlock { block: BlockId },

    #[error("lesson {lesson} does not belong to block {block}")]
    MisplacedLesson { block: BlockId, lesson: LessonId },

    #[error("duplicate lesson id {lesson}")]
    DuplicateLesson { lesson: LessonId },

    #[error("block {block} has an empty title")]
    EmptyTitle { block: BlockId },
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// A single unit of generated study content.
///
/// The `topic` is seed material for the lesson-authoring prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lesson {
    id: LessonId,
    title: String,
    topic: String,
}

impl Lesson {
    #[must_use]
    pub fn new(id: LessonId, title: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            topic: topic.into(),
        }
    }

    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

//
// ─── BLOCK ─────────────────────────────────────────────────────────────────────
//

/// A curriculum module: a named group of lessons gated by a passing exam.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    id: BlockId,
    title: String,
    description: String,
    lessons: Vec<Lesson>,
}

impl Block {
    #[must_use]
    pub fn new(
        id: BlockId,
        title: impl Into<String>,
        description: impl Into<String>,
        lessons: Vec<Lesson>,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            description: description.into(),
            lessons,
        }
    }

    #[must_use]
    pub fn id(&self) -> BlockId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    #[must_use]
    pub fn lessons(&self) -> &[Lesson] {
        &self.lessons
    }

    #[must_use]
    pub fn lesson(&self, id: LessonId) -> Option<&Lesson> {
        self.lessons.iter().find(|lesson| lesson.id == id)
    }

    #[must_use]
    pub fn first_lesson(&self) -> &Lesson {
        // Non-empty by catalog validation.
        &self.lessons[0]
    }

    fn position_of(&self, id: LessonId) -> Option<usize> {
        self.lessons.iter().position(|lesson| lesson.id == id)
    }
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Immutable, validated curriculum table.
///
/// Blocks are numbered `1..=n` without gaps and every block has at least one
/// lesson whose id is namespaced under the block id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    blocks: Vec<Block>,
}

impl Catalog {
    /// Validate and build a catalog.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` if blocks are missing, out of order, empty, or if a
    /// lesson id is duplicated or namespaced under the wrong block.
    pub fn new(blocks: Vec<Block>) -> Result<Self, CatalogError> {
        if blocks.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = std::collections::HashSet::new();
        for (position, block) in blocks.iter().enumerate() {
            let expected = u32::try_from(position + 1).unwrap_or(u32::MAX);
            if block.id.value() != expected {
                return Err(CatalogError::NonSequentialBlock {
                    position,
                    found: block.id,
                });
            }
            if block.title.trim().is_empty() {
                return Err(CatalogError::EmptyTitle { block: block.id });
            }
            if block.lessons.is_empty() {
                return Err(CatalogError::EmptyBlock { block: block.id });
            }
            for lesson in &block.lessons {
                if lesson.id.block() != block.id {
                    return Err(CatalogError::MisplacedLesson {
                        block: block.id,
                        lesson: lesson.id,
                    });
                }
                if !seen.insert(lesson.id) {
                    return Err(CatalogError::DuplicateLesson { lesson: lesson.id });
                }
            }
        }

        Ok(Self { blocks })
    }

    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        let index = usize::try_from(id.value()).ok()?.checked_sub(1)?;
        self.blocks.get(index)
    }

    #[must_use]
    pub fn first_block(&self) -> &Block {
        &self.blocks[0]
    }

    #[must_use]
    pub fn last_block_id(&self) -> BlockId {
        self.blocks[self.blocks.len() - 1].id
    }

    #[must_use]
    pub fn contains_block(&self, id: BlockId) -> bool {
        self.block(id).is_some()
    }

    /// Finds a lesson anywhere in the catalog.
    #[must_use]
    pub fn lesson(&self, id: LessonId) -> Option<&Lesson> {
        self.block(id.block())?.lesson(id)
    }

    /// Returns true when `lesson` is listed under `block`.
    #[must_use]
    pub fn is_valid_cursor(&self, block: BlockId, lesson: LessonId) -> bool {
        self.block(block)
            .is_some_and(|found| found.lesson(lesson).is_some())
    }

    /// Iterates every lesson in block-then-lesson order.
    pub fn lessons(&self) -> impl Iterator<Item = &Lesson> {
        self.blocks.iter().flat_map(|block| block.lessons.iter())
    }

    #[must_use]
    pub fn total_lessons(&self) -> usize {
        self.blocks.iter().map(|block| block.lessons.len()).sum()
    }

    /// The lesson following `lesson` within the same block.
    #[must_use]
    pub fn next_in_block(&self, lesson: LessonId) -> Option<&Lesson> {
        let block = self.block(lesson.block())?;
        let position = block.position_of(lesson)?;
        block.lessons.get(position + 1)
    }

    /// The lesson preceding `lesson` within the same block.
    #[must_use]
    pub fn previous_in_block(&self, lesson: LessonId) -> Option<&Lesson> {
        let block = self.block(lesson.block())?;
        let position = block.position_of(lesson)?;
        position.checked_sub(1).and_then(|prev| block.lessons.get(prev))
    }

    #[must_use]
    pub fn is_first_lesson(&self, lesson: LessonId) -> bool {
        self.first_block().first_lesson().id == lesson
    }

    #[must_use]
    pub fn is_last_lesson(&self, lesson: LessonId) -> bool {
        self.blocks
            .last()
            .and_then(|block| block.lessons.last())
            .is_some_and(|last| last.id == lesson)
    }

    /// The built-in master's curriculum in artificial intelligence:
    /// six blocks of four lessons each.
    #[must_use]
    pub fn standard() -> Self {
        let blocks = STANDARD_CURRICULUM
            .iter()
            .enumerate()
            .map(|(block_index, (title, description, lessons))| {
                let block_id = BlockId::new(u32::try_from(block_index + 1).unwrap_or(u32::MAX));
                let lessons = lessons
                    .iter()
                    .enumerate()
                    .map(|(lesson_index, (lesson_title, topic))| {
                        let ordinal = u32::try_from(lesson_index + 1).unwrap_or(u32::MAX);
                        Lesson::new(LessonId::new(block_id, ordinal), *lesson_title, *topic)
                    })
                    .collect();
                Block::new(block_id, *title, *description, lessons)
            })
            .collect();

        Self { blocks }
    }
}

type LessonSeed = (&'static str, &'static str);
type BlockSeed = (&'static str, &'static str, [LessonSeed; 4]);

const STANDARD_CURRICULUM: [BlockSeed; 6] = [
    (
        "Foundations of Artificial Intelligence",
        "Introductory concepts, history and the mathematical pillars of AI.",
        [
            (
                "History and Evolution of AI",
                "From Turing to modern LLMs, the AI winters and key milestones.",
            ),
            (
                "Linear Algebra and Calculus for AI",
                "Vectors, matrices, tensors and gradient descent.",
            ),
            (
                "Probability and Statistics",
                "Bayes' theorem, distributions and handling uncertainty in data.",
            ),
            (
                "Python for Data Science",
                "Essential libraries: NumPy, Pandas and basic visualization.",
            ),
        ],
    ),
    (
        "Machine Learning Fundamentals",
        "Supervised and unsupervised learning techniques.",
        [
            (
                "Regression Analysis",
                "Linear and polynomial regression, cost functions and optimization.",
            ),
            (
                "Classification Algorithms",
                "Logistic regression, SVMs and decision trees.",
            ),
            (
                "Clustering and Dimensionality Reduction",
                "K-Means, PCA and grouping techniques.",
            ),
            (
                "Ensemble Methods",
                "Random forests and boosting algorithms such as XGBoost.",
            ),
        ],
    ),
    (
        "Deep Learning and Neural Networks",
        "The architecture of artificial brains.",
        [
            (
                "Multilayer Perceptron",
                "Activation functions (ReLU, sigmoid) and forward propagation.",
            ),
            (
                "Backpropagation in Detail",
                "The chain rule and weight updates across the network.",
            ),
            (
                "Regularization Techniques",
                "Dropout, batch normalization and preventing overfitting.",
            ),
            (
                "Optimization Algorithms",
                "Adam, RMSprop and learning-rate strategies.",
            ),
        ],
    ),
    (
        "Natural Language Processing and LLMs",
        "Processing human language and the Transformer revolution.",
        [
            (
                "Preprocessing and Embeddings",
                "Tokenization, Word2Vec and vector representations of language.",
            ),
            (
                "Sequence Models",
                "RNNs, LSTMs and the limits of sequential memory.",
            ),
            (
                "The Transformer Architecture",
                "Self-attention and the encoder-decoder structure.",
            ),
            (
                "Large Language Models",
                "Fine-tuning, prompt engineering and RAG.",
            ),
        ],
    ),
    (
        "Computer Vision and Generative AI",
        "Visual perception and content creation.",
        [
            (
                "Convolutional Neural Networks",
                "Filters, kernels and visual feature extraction.",
            ),
            (
                "Object Detection and Segmentation",
                "YOLO, R-CNN architectures and semantic segmentation.",
            ),
            (
                "Generative Adversarial Networks",
                "The competition between generator and discriminator.",
            ),
            (
                "Diffusion Models",
                "How Stable Diffusion works and text-to-image generation.",
            ),
        ],
    ),
    (
        "Ethics, Governance and the Future (AGI)",
        "Social, legal and future impact of intelligence.",
        [
            (
                "Bias and Fairness in AI",
                "Identifying prejudice in data and mitigating algorithmic bias.",
            ),
            (
                "AI Safety and Alignment",
                "Aligning AI objectives with human values.",
            ),
            (
                "Global Regulatory Framework",
                "The EU AI Act and international governance.",
            ),
            (
                "Towards Artificial General Intelligence",
                "Theories of superintelligence and the open challenges in reaching it.",
            ),
        ],
    ),
];

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}
