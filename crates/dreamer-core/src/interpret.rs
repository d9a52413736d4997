//! Hypothesis generation.
//!
//! A [`HypothesisGenerator`] turns a dream and its annotations into draft
//! hypotheses. The [`Interpreter`] gathers that context from the repository,
//! checks the drafts structurally, and stores them in one atomic batch.
//! [`TemplateGenerator`] is a deterministic generator that needs no external
//! service.

use std::future::Future;

use tracing::info;

use crate::{
  Error,
  association::Association,
  document::Row,
  dream::Dream,
  element::{Element, ElementListOptions},
  hypothesis::{DraftHypothesis, Evidence, EvidenceKind, Hypothesis, Lens},
  paths,
  repo::Repository,
  store::DocumentStore,
  timestamp,
};

/// Anchor id used by evidence that quotes the dream text itself.
pub const DREAM_TEXT_REF: &str = "dream-main";

/// Characters of dream text quoted as evidence.
const EXCERPT_CHARS: usize = 100;

/// Everything a generator sees about one dream.
#[derive(Debug, Clone)]
pub struct GeneratorInput {
  pub dream_id:     String,
  pub dream:        Dream,
  /// Visible elements only.
  pub elements:     Vec<Row<Element>>,
  pub associations: Vec<Row<Association>>,
}

pub trait HypothesisGenerator: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn generate(
    &self,
    input: GeneratorInput,
  ) -> impl Future<Output = Result<Vec<DraftHypothesis>, Self::Error>> + Send + '_;
}

// ─── Template generator ──────────────────────────────────────────────────────

/// Lenses used by [`TemplateGenerator`], in emission order.
const TEMPLATE_LENSES: [Lens; 3] = [Lens::Shadow, Lens::Compensation, Lens::Individuation];

/// Builds hypotheses from fixed per-lens wording, citing the dream text and
/// the first element and association when there are any.
#[derive(Debug, Clone, Copy)]
pub struct TemplateGenerator {
  count: usize,
}

impl TemplateGenerator {
  pub const MIN_COUNT: usize = 2;
  pub const MAX_COUNT: usize = TEMPLATE_LENSES.len();

  /// `count` is clamped to `2..=3`.
  pub fn new(count: usize) -> Self {
    Self {
      count: count.clamp(Self::MIN_COUNT, Self::MAX_COUNT),
    }
  }

  pub fn count(&self) -> usize { self.count }

  fn evidence(input: &GeneratorInput) -> Vec<Evidence> {
    let mut evidence = Vec::new();
    let excerpt: String = input.dream.raw_text.chars().take(EXCERPT_CHARS).collect();
    if !excerpt.trim().is_empty() {
      evidence.push(Evidence {
        kind:   EvidenceKind::DreamText,
        ref_id: DREAM_TEXT_REF.to_owned(),
        quote:  excerpt,
      });
    }
    if let Some(element) = input.elements.first() {
      evidence.push(Evidence {
        kind:   EvidenceKind::Element,
        ref_id: element.id.clone(),
        quote:  element.data.label.clone(),
      });
    }
    if let Some(association) = input.associations.first() {
      evidence.push(Evidence {
        kind:   EvidenceKind::Association,
        ref_id: association.id.clone(),
        quote:  association.data.association_text.clone(),
      });
    }
    evidence
  }
}

impl Default for TemplateGenerator {
  fn default() -> Self { Self::new(Self::MIN_COUNT) }
}

fn template_text(lens: Lens) -> &'static str {
  match lens {
    Lens::Shadow => {
      "This dream might reflect unacknowledged aspects of yourself that seek \
       integration and recognition in your waking life."
    }
    Lens::Compensation => {
      "This dream might compensate for one-sided attitudes in your waking \
       consciousness, offering a balancing perspective."
    }
    Lens::Individuation => {
      "This dream might indicate a step in your individuation journey, \
       revealing aspects of your developing wholeness."
    }
    Lens::ArchetypalDynamics => {
      "This dream might express archetypal patterns that transcend personal \
       experience and connect to universal human themes."
    }
    Lens::RelationalAnimaAnimus => {
      "This dream might explore the relationship between your conscious \
       identity and complementary unconscious qualities."
    }
  }
}

fn template_question(lens: Lens) -> &'static str {
  match lens {
    Lens::Shadow => {
      "What parts of yourself do you find difficult to acknowledge or integrate?"
    }
    Lens::Compensation => {
      "How might this dream balance or challenge your current waking attitudes?"
    }
    Lens::Individuation => {
      "What aspects of yourself are seeking fuller expression in your life?"
    }
    Lens::ArchetypalDynamics => {
      "What universal patterns or themes resonate with your current life \
       situation?"
    }
    Lens::RelationalAnimaAnimus => {
      "How do the characters or relationships in this dream reflect different \
       aspects of yourself?"
    }
  }
}

impl HypothesisGenerator for TemplateGenerator {
  type Error = std::convert::Infallible;

  async fn generate(
    &self,
    input: GeneratorInput,
  ) -> Result<Vec<DraftHypothesis>, Self::Error> {
    let evidence = Self::evidence(&input);
    Ok(
      TEMPLATE_LENSES
        .iter()
        .take(self.count)
        .map(|&lens| DraftHypothesis {
          lens,
          hypothesis_text: template_text(lens).to_owned(),
          evidence: evidence.clone(),
          reflective_question: template_question(lens).to_owned(),
        })
        .collect(),
    )
  }
}

// ─── Interpreter ─────────────────────────────────────────────────────────────

pub struct Interpreter<S, G> {
  repo:      Repository<S>,
  generator: G,
}

impl<S: DocumentStore, G: HypothesisGenerator> Interpreter<S, G> {
  pub fn new(repo: Repository<S>, generator: G) -> Self { Self { repo, generator } }

  /// Generate and store a fresh set of hypotheses for one dream.
  ///
  /// Fails with [`Error::DreamNotFound`] if the dream does not exist. If any
  /// draft is structurally invalid nothing is stored. Existing hypotheses are
  /// left alone; the new ones are added next to them.
  pub async fn interpret(
    &self,
    uid: &str,
    dream_id: &str,
  ) -> Result<Vec<Row<Hypothesis>>, S::Error> {
    let Some(dream) = self.repo.get_dream(uid, dream_id).await? else {
      return Err(Error::DreamNotFound(dream_id.to_owned()).into());
    };
    let (elements, associations) = tokio::try_join!(
      self
        .repo
        .list_elements(uid, dream_id, ElementListOptions::default()),
      self.repo.list_associations(uid, dream_id),
    )?;

    let input = GeneratorInput {
      dream_id: dream_id.to_owned(),
      dream,
      elements,
      associations,
    };
    let drafts = self
      .generator
      .generate(input)
      .await
      .map_err(|e| Error::Generator(Box::new(e)))?;

    for draft in &drafts {
      draft.validate()?;
    }

    let now = timestamp::now();
    let rows: Vec<Row<Hypothesis>> = drafts
      .into_iter()
      .map(|draft| Row::new(paths::new_id(), draft.into_hypothesis(now)))
      .collect();
    self.repo.bulk_upsert_hypotheses(uid, dream_id, &rows).await?;

    info!(uid, dream_id, count = rows.len(), "stored generated hypotheses");
    Ok(rows)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    association::{EmotionalValence, Salience},
    dream::NewDream,
    element::{ElementKind, ElementSource},
  };

  fn input(raw_text: &str) -> GeneratorInput {
    GeneratorInput {
      dream_id:     "d1".into(),
      dream:        NewDream::new(raw_text).into_dream(timestamp::now()),
      elements:     Vec::new(),
      associations: Vec::new(),
    }
  }

  #[test]
  fn count_is_clamped() {
    assert_eq!(TemplateGenerator::new(0).count(), 2);
    assert_eq!(TemplateGenerator::new(3).count(), 3);
    assert_eq!(TemplateGenerator::new(9).count(), 3);
  }

  #[tokio::test]
  async fn default_emits_shadow_then_compensation() {
    let drafts = TemplateGenerator::default()
      .generate(input("I was walking along a river at night."))
      .await
      .unwrap();
    let lenses: Vec<Lens> = drafts.iter().map(|d| d.lens).collect();
    assert_eq!(lenses, [Lens::Shadow, Lens::Compensation]);
    for draft in &drafts {
      assert!(draft.validate().is_ok());
      assert_eq!(draft.evidence.len(), 1);
      assert_eq!(draft.evidence[0].ref_id, DREAM_TEXT_REF);
    }
  }

  #[tokio::test]
  async fn quotes_at_most_a_hundred_characters() {
    let long = "é".repeat(250);
    let drafts = TemplateGenerator::new(3).generate(input(&long)).await.unwrap();
    assert_eq!(drafts.len(), 3);
    assert_eq!(drafts[2].lens, Lens::Individuation);
    assert_eq!(drafts[0].evidence[0].quote.chars().count(), 100);
  }

  #[tokio::test]
  async fn cites_first_element_and_association() {
    let now = timestamp::now();
    let mut input = input("A house with many rooms.");
    input.elements = vec![
      Row::new("e1", Element::new(ElementKind::Place, "house", ElementSource::User, now)),
      Row::new("e2", Element::new(ElementKind::Symbol, "key", ElementSource::User, now)),
    ];
    input.associations = vec![Row::new("a1", Association {
      element_id:        "e1".into(),
      association_text:  "my grandmother's home".into(),
      emotional_valence: EmotionalValence::Positive,
      salience:          Salience::clamp(4.0),
      created_at:        now,
      updated_at:        None,
    })];

    let drafts = TemplateGenerator::default().generate(input).await.unwrap();
    let evidence = &drafts[0].evidence;
    assert_eq!(evidence.len(), 3);
    assert_eq!(evidence[1].kind, EvidenceKind::Element);
    assert_eq!(evidence[1].ref_id, "e1");
    assert_eq!(evidence[1].quote, "house");
    assert_eq!(evidence[2].kind, EvidenceKind::Association);
    assert_eq!(evidence[2].quote, "my grandmother's home");
  }

  #[tokio::test]
  async fn blank_dream_without_annotations_yields_invalid_drafts() {
    let drafts = TemplateGenerator::default().generate(input("   ")).await.unwrap();
    assert!(drafts.iter().all(|d| d.validate().is_err()));
  }
}
