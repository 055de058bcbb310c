pub fn build_entity_prompt(sentence: &str) -> String {
    format!(
        r#"Extract the named entities from the following sentence.

INSTRUCTIONS:
1. Identify key entities (people, organizations, concepts, technologies, locations, events)
2. Output ONLY valid JSON, nothing else
3. Use the exact schema below

SCHEMA:
{{
  "entities": [
    {{"name": "EntityName", "type": "PERSON|ORGANIZATION|CONCEPT|TECHNOLOGY|LOCATION|EVENT"}}
  ]
}}

RULES:
- Entity types must be one of: PERSON, ORGANIZATION, CONCEPT, TECHNOLOGY, LOCATION, EVENT
- Use the surface form from the sentence as the name
- Output ONLY the JSON object, no markdown, no explanations

SENTENCE:
{}

JSON OUTPUT:"#,
        sentence
    )
}

pub fn build_relation_prompt(sentence: &str, entity_a: &str, entity_b: &str) -> String {
    format!(
        r#"Given a sentence and two entities mentioned in it, name the relationship between them.

INSTRUCTIONS:
1. Output ONLY valid JSON, nothing else
2. The relation should be a short verb phrase, e.g. "develops", "cites", "works_at"
3. If the sentence states no relationship between the two entities, use null

SCHEMA:
{{"relation": "verb_phrase" }}
or
{{"relation": null}}

SENTENCE:
{}

ENTITY A: {}
ENTITY B: {}

JSON OUTPUT:"#,
        sentence, entity_a, entity_b
    )
}
